use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a monthly fee record.
///
/// The scanner only ever performs `Pending -> Late`; `-> Paid` happens in the
/// payment flow and is never touched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum FeeStatus {
    Pending,
    Late,
    Paid,
}

impl std::fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeStatus::Pending => write!(f, "pending"),
            FeeStatus::Late => write!(f, "late"),
            FeeStatus::Paid => write!(f, "paid"),
        }
    }
}

/// State of a queued notification record.
///
/// There is no `sent` state: successful dispatch deletes the record, so the
/// queue only ever holds `pending` work and `error` residue kept for triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Error,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Error => write!(f, "error"),
        }
    }
}

/// One managed building/condominium instance within an environment partition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub env: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A resident account scoped to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Push-delivery tokens for this member's devices. May be empty.
    pub fcm_tokens: Vec<String>,
}

impl Member {
    /// Portion of the display name before the first space, used in
    /// notification copy. Falls back to the full name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// One billing-period charge record for a member.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyFee {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Billing month, 1-12.
    pub month: i32,
    pub year: i32,
    pub status: FeeStatus,
    pub updated_at: DateTime<Utc>,
}

/// A durable work item representing one push notification to be sent.
///
/// Produced by the scanner (and any other app logic), consumed and deleted by
/// the queue drain worker. Exactly one of `topic` / non-empty `tokens` is
/// expected; a record with neither is dispatched as a silent no-op.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Free-form payload merged verbatim into the outgoing push message.
    pub data: serde_json::Value,
    pub topic: Option<String>,
    pub tokens: Option<Vec<String>>,
    pub status: QueueStatus,
    pub error: Option<String>,
    /// Traceability tags set by the producer.
    pub tenant_id: Option<String>,
    pub env: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Resolved recipient selector of a notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Broadcast to all subscribers of a named topic.
    Topic(String),
    /// Multicast to an explicit device-token list.
    Tokens(Vec<String>),
    /// Neither selector set — documented silent no-op.
    Missing,
}

impl NotificationRecord {
    /// Resolve the recipient selector. A non-empty `topic` takes precedence
    /// over `tokens`; empty values are treated as unset.
    pub fn audience(&self) -> Audience {
        if let Some(topic) = self.topic.as_deref().filter(|t| !t.is_empty()) {
            return Audience::Topic(topic.to_string());
        }
        if let Some(tokens) = self.tokens.as_ref().filter(|t| !t.is_empty()) {
            return Audience::Tokens(tokens.clone());
        }
        Audience::Missing
    }

    /// Flatten the `data` payload into the string-to-string map the push
    /// gateway expects. Non-string scalars are rendered as their JSON text;
    /// nested values are passed through as serialized JSON. A non-object
    /// payload yields an empty map.
    pub fn data_strings(&self) -> BTreeMap<String, String> {
        let Some(object) = self.data.as_object() else {
            return BTreeMap::new();
        };

        object
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: Option<&str>, tokens: Option<Vec<&str>>) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            title: "title".to_string(),
            body: "body".to_string(),
            data: serde_json::json!({}),
            topic: topic.map(str::to_string),
            tokens: tokens.map(|t| t.into_iter().map(str::to_string).collect()),
            status: QueueStatus::Pending,
            error: None,
            tenant_id: None,
            env: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_audience_topic_wins_over_tokens() {
        let rec = record(Some("general"), Some(vec!["a", "b"]));
        assert_eq!(rec.audience(), Audience::Topic("general".to_string()));
    }

    #[test]
    fn test_audience_empty_topic_falls_back_to_tokens() {
        let rec = record(Some(""), Some(vec!["a", "b"]));
        assert_eq!(
            rec.audience(),
            Audience::Tokens(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_audience_missing_when_both_unset() {
        assert_eq!(record(None, None).audience(), Audience::Missing);
        assert_eq!(record(None, Some(vec![])).audience(), Audience::Missing);
    }

    #[test]
    fn test_data_strings_renders_scalars() {
        let mut rec = record(Some("general"), None);
        rec.data = serde_json::json!({
            "category": "fee",
            "month": 3,
            "nested": { "a": 1 }
        });
        let data = rec.data_strings();
        assert_eq!(data.get("category"), Some(&"fee".to_string()));
        assert_eq!(data.get("month"), Some(&"3".to_string()));
        assert_eq!(data.get("nested"), Some(&"{\"a\":1}".to_string()));
    }

    #[test]
    fn test_data_strings_non_object_is_empty() {
        let mut rec = record(None, Some(vec!["a"]));
        rec.data = serde_json::json!("not a map");
        assert!(rec.data_strings().is_empty());
    }

    #[test]
    fn test_first_name() {
        let member = Member {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Maria da Silva".to_string(),
            fcm_tokens: vec![],
        };
        assert_eq!(member.first_name(), "Maria");

        let single = Member {
            name: "Jo".to_string(),
            ..member.clone()
        };
        assert_eq!(single.first_name(), "Jo");
    }
}

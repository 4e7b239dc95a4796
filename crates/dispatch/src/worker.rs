//! Queue drain worker.
//!
//! Polls `notifications_queue` for `pending` records and processes each one:
//! 1. Resolve the recipient selector (topic wins over tokens)
//! 2. Send through the push gateway with the static platform hints
//! 3. Delete the record on success — deletion is the sole acknowledgment
//! 4. On gateway failure, keep the record with `status = 'error'` and the
//!    error message for manual triage; it is never retried automatically
//!
//! Records whose selector is missing entirely are dispatched as a silent
//! no-op and deleted.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Audience, NotificationRecord, QueueStatus};
use herald_push::{MulticastOutcome, PushError, PushGateway, PushMessage};

/// What happened to one record's dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// One topic broadcast was sent.
    Topic { message_name: String },
    /// One multicast was sent; per-token failures are inside the outcome.
    Multicast(MulticastOutcome),
    /// No recipient selector — nothing was sent.
    NoRecipient,
}

/// Resolve a record's audience and perform the gateway call.
///
/// Pure with respect to the database: the caller owns the delete/update that
/// follows. A `PushError` here means the record must be kept in error state.
pub async fn dispatch_record<G: PushGateway>(
    gateway: &G,
    record: &NotificationRecord,
) -> Result<DispatchOutcome, PushError> {
    let message = PushMessage {
        title: record.title.clone(),
        body: record.body.clone(),
        data: record.data_strings(),
    };

    match record.audience() {
        Audience::Topic(topic) => {
            let message_name = gateway.send_to_topic(&topic, &message).await?;
            Ok(DispatchOutcome::Topic { message_name })
        }
        Audience::Tokens(tokens) => {
            let outcome = gateway.send_multicast(&tokens, &message).await?;
            Ok(DispatchOutcome::Multicast(outcome))
        }
        Audience::Missing => Ok(DispatchOutcome::NoRecipient),
    }
}

/// Polling worker that drains the notification queue.
pub struct QueueWorker<G: PushGateway> {
    pool: PgPool,
    gateway: G,
    poll_interval: Duration,
}

impl<G: PushGateway> QueueWorker<G> {
    pub fn new(pool: PgPool, gateway: G, poll_interval_ms: u64) -> Self {
        Self {
            pool,
            gateway,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Start the drain loop. Runs indefinitely until the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Queue drain worker started"
        );

        loop {
            let processed = self.drain_once().await?;
            if processed > 0 {
                tracing::info!(processed, "Drained notification queue");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Process every currently pending record once. Returns the number of
    /// records handled in this pass.
    pub async fn drain_once(&self) -> Result<u32, AppError> {
        let records: Vec<NotificationRecord> = sqlx::query_as(
            "SELECT * FROM notifications_queue WHERE status = $1 ORDER BY created_at",
        )
        .bind(QueueStatus::Pending.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut processed = 0u32;

        for record in &records {
            match dispatch_record(&self.gateway, record).await {
                Ok(outcome) => {
                    match &outcome {
                        DispatchOutcome::Topic { message_name } => {
                            tracing::info!(
                                record_id = %record.id,
                                topic = record.topic.as_deref().unwrap_or_default(),
                                message_name = %message_name,
                                "Notification sent to topic"
                            );
                        }
                        DispatchOutcome::Multicast(m) => {
                            tracing::info!(
                                record_id = %record.id,
                                success = m.success_count,
                                failed = m.failure_count,
                                "Notification multicast sent"
                            );
                        }
                        DispatchOutcome::NoRecipient => {
                            tracing::warn!(
                                record_id = %record.id,
                                "Notification record has no recipient selector, dropping"
                            );
                        }
                    }
                    self.delete_record(record.id).await?;
                }
                Err(e) => {
                    tracing::error!(
                        record_id = %record.id,
                        error = %e,
                        "Failed to dispatch notification, keeping record in error state"
                    );
                    self.mark_error(record.id, &e.to_string()).await?;
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM notifications_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE notifications_queue SET status = $1, error = $2 WHERE id = $3")
            .bind(QueueStatus::Error.to_string())
            .bind(message)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SentCall {
        Topic(String),
        Multicast(Vec<String>),
    }

    /// Records calls; fails every send when `fail` is set.
    struct MockGateway {
        calls: Mutex<Vec<SentCall>>,
        fail: bool,
    }

    impl MockGateway {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl PushGateway for MockGateway {
        async fn send_to_topic(
            &self,
            topic: &str,
            _message: &PushMessage,
        ) -> Result<String, PushError> {
            if self.fail {
                return Err(PushError::Gateway {
                    status: 503,
                    detail: "unavailable".to_string(),
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push(SentCall::Topic(topic.to_string()));
            Ok("projects/test/messages/1".to_string())
        }

        async fn send_multicast(
            &self,
            tokens: &[String],
            _message: &PushMessage,
        ) -> Result<MulticastOutcome, PushError> {
            if self.fail {
                return Err(PushError::Gateway {
                    status: 503,
                    detail: "unavailable".to_string(),
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push(SentCall::Multicast(tokens.to_vec()));
            Ok(MulticastOutcome {
                success_count: tokens.len(),
                failure_count: 0,
            })
        }
    }

    fn record(topic: Option<&str>, tokens: Option<Vec<&str>>) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            title: "General notice".to_string(),
            body: "Water maintenance tomorrow".to_string(),
            data: serde_json::json!({ "category": "notice" }),
            topic: topic.map(str::to_string),
            tokens: tokens.map(|t| t.into_iter().map(str::to_string).collect()),
            status: QueueStatus::Pending,
            error: None,
            tenant_id: None,
            env: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_topic_record_sends_one_topic_call() {
        let gateway = MockGateway::new(false);
        let outcome = dispatch_record(&gateway, &record(Some("general"), None))
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Topic { .. }));
        assert_eq!(
            *gateway.calls.lock().unwrap(),
            vec![SentCall::Topic("general".to_string())]
        );
    }

    #[tokio::test]
    async fn test_token_record_sends_one_multicast_with_all_tokens() {
        let gateway = MockGateway::new(false);
        let outcome = dispatch_record(&gateway, &record(None, Some(vec!["a", "b"])))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Multicast(MulticastOutcome {
                success_count: 2,
                failure_count: 0,
            })
        );
        assert_eq!(
            *gateway.calls.lock().unwrap(),
            vec![SentCall::Multicast(vec!["a".to_string(), "b".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_missing_selector_is_silent_noop() {
        let gateway = MockGateway::new(false);
        let outcome = dispatch_record(&gateway, &record(None, None)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::NoRecipient);
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces_error_message() {
        let gateway = MockGateway::new(true);
        let err = dispatch_record(&gateway, &record(None, Some(vec!["a"])))
            .await
            .unwrap_err();

        assert!(!err.to_string().is_empty());
        assert!(err.to_string().contains("503"));
    }
}

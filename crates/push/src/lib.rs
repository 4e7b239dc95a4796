//! Push-gateway abstraction for the notification pipeline.
//!
//! Exposes the two delivery shapes the queue drain worker needs:
//! - topic send (broadcast to all subscribers of a named channel)
//! - multicast send (explicit device-token list in one logical call)
//!
//! Platform delivery hints are static policy attached to every message,
//! independent of record content: high-priority + default sound + a named
//! channel on Android, default sound + badge increment on APNs.

pub mod fcm;

use std::collections::BTreeMap;

use serde_json::json;
use thiserror::Error;

/// Android notification channel used for user-visible popups.
pub const ANDROID_CHANNEL_ID: &str = "high_importance_channel";

/// Errors from the push gateway.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Push gateway rejected send (status {status}): {detail}")]
    Gateway { status: u16, detail: String },

    #[error("Push configuration error: {0}")]
    Config(String),
}

/// Platform-agnostic push payload built from a notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Free-form key/value payload merged verbatim into the message.
    pub data: BTreeMap<String, String>,
}

/// Result of a multicast send. Per-token failures are reported here, not as
/// a `PushError` — only a full send-call failure is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastOutcome {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Seam between the queue drain worker and the concrete push service.
pub trait PushGateway: Send + Sync {
    /// Send one broadcast addressed to a named topic. Returns the gateway's
    /// message identifier.
    fn send_to_topic(
        &self,
        topic: &str,
        message: &PushMessage,
    ) -> impl Future<Output = Result<String, PushError>> + Send;

    /// Send one multicast addressed to an explicit token list.
    fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> impl Future<Output = Result<MulticastOutcome, PushError>> + Send;
}

/// Build the gateway message body for one target.
///
/// `target` is the FCM v1 target field, e.g. `("topic", "general")` or
/// `("token", "<device token>")`. The static platform hints are attached
/// unconditionally.
pub fn message_body(target: (&str, &str), message: &PushMessage) -> serde_json::Value {
    let mut body = json!({
        "message": {
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
            "android": {
                "priority": "HIGH",
                "notification": {
                    "sound": "default",
                    "channel_id": ANDROID_CHANNEL_ID,
                }
            },
            "apns": {
                "payload": {
                    "aps": {
                        "sound": "default",
                        "badge": 1,
                    }
                }
            }
        }
    });

    body["message"][target.0] = json!(target.1);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> PushMessage {
        PushMessage {
            title: "Fee reminder".to_string(),
            body: "Hi Maria".to_string(),
            data: BTreeMap::from([
                ("category".to_string(), "fee".to_string()),
                ("month".to_string(), "3".to_string()),
            ]),
        }
    }

    #[test]
    fn test_message_body_carries_platform_hints() {
        let body = message_body(("topic", "general"), &message());
        let msg = &body["message"];

        assert_eq!(msg["topic"], "general");
        assert_eq!(msg["android"]["priority"], "HIGH");
        assert_eq!(msg["android"]["notification"]["sound"], "default");
        assert_eq!(
            msg["android"]["notification"]["channel_id"],
            ANDROID_CHANNEL_ID
        );
        assert_eq!(msg["apns"]["payload"]["aps"]["badge"], 1);
        assert_eq!(msg["apns"]["payload"]["aps"]["sound"], "default");
    }

    #[test]
    fn test_message_body_merges_data_verbatim() {
        let body = message_body(("token", "abc"), &message());
        let msg = &body["message"];

        assert_eq!(msg["token"], "abc");
        assert_eq!(msg["data"]["category"], "fee");
        assert_eq!(msg["data"]["month"], "3");
        assert_eq!(msg["notification"]["title"], "Fee reminder");
        assert_eq!(msg["notification"]["body"], "Hi Maria");
    }
}

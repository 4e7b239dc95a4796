//! FCM HTTP v1 client.
//!
//! The v1 API has no batch endpoint, so a multicast is one logical call that
//! fans out per token inside the client. A non-2xx response for an individual
//! token counts as a per-token failure; only a transport-level error (or a
//! rejected topic send) aborts the call. This mirrors the gateway's
//! "send each for multicast" semantics.

use crate::{MulticastOutcome, PushError, PushGateway, PushMessage, message_body};

const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Client for the FCM HTTP v1 `messages:send` endpoint.
///
/// Authentication uses a pre-minted OAuth bearer token; minting from a
/// service-account key is left to the deployment environment.
pub struct FcmClient {
    http: reqwest::Client,
    project_id: String,
    auth_token: String,
    endpoint: String,
}

impl FcmClient {
    pub fn new(project_id: String, auth_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id,
            auth_token,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Override the gateway base URL (used against a local stub).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }

    /// POST one message body, returning the gateway's message name.
    async fn post_message(&self, body: &serde_json::Value) -> Result<String, PushError> {
        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PushError::Gateway {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: serde_json::Value = response.json().await?;
        Ok(parsed
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

impl PushGateway for FcmClient {
    async fn send_to_topic(
        &self,
        topic: &str,
        message: &PushMessage,
    ) -> Result<String, PushError> {
        let body = message_body(("topic", topic), message);
        let name = self.post_message(&body).await?;
        tracing::info!(topic, message_name = %name, "Topic notification sent");
        Ok(name)
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastOutcome, PushError> {
        let mut outcome = MulticastOutcome {
            success_count: 0,
            failure_count: 0,
        };

        for token in tokens {
            let body = message_body(("token", token), message);
            match self.post_message(&body).await {
                Ok(_) => outcome.success_count += 1,
                Err(PushError::Gateway { status, detail }) => {
                    // Invalid or expired token: counted, never fatal.
                    tracing::warn!(status, detail, "Per-token send rejected");
                    outcome.failure_count += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            success = outcome.success_count,
            failed = outcome.failure_count,
            "Multicast send completed"
        );
        Ok(outcome)
    }
}

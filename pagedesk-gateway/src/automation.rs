//! Automation-webhook delivery with exponential-backoff retry
//!
//! Application events (comment replies, DM sends, AI-control toggles) are
//! forwarded to externally configured automation endpoints. Delivery runs
//! in a spawned task and is best-effort: failures are logged, never
//! surfaced to the triggering request. Target URLs must already have passed
//! the policy check in `pagedesk_core::policy`.

use std::time::Duration;

use crate::error::GatewayError;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers automation events to external webhook endpoints.
pub struct AutomationDelivery {
    client: reqwest::Client,
}

impl AutomationDelivery {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build automation HTTP client");
        Self { client }
    }

    /// Deliver an event payload with retry. Returns `Ok(())` on the first
    /// successful attempt.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        let mut last_err = None;

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.iter().enumerate() {
            match self.try_send(url, payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Automation webhook attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(url, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url, error = %e, "Automation webhook failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("HTTP request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(GatewayError::Upstream(format!(
                "webhook returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

impl Default for AutomationDelivery {
    fn default() -> Self {
        Self::new()
    }
}

//! Fire-and-forget client for the analysis service trigger

use reqwest::Client;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const TRIGGER_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts `/analyze/:session_id` to xpi-an
#[derive(Debug, Clone)]
pub struct AnalysisTrigger {
    client: Client,
    base_url: String,
}

impl AnalysisTrigger {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(TRIGGER_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the trigger on a background task; failures are only logged
    pub fn fire(&self, session_id: Uuid) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = format!("{}/analyze/{}", self.base_url, session_id);

        tokio::spawn(async move {
            match client.post(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(session_id = %session_id, status = %response.status(), "Analysis triggered");
                }
                Ok(response) => {
                    warn!(
                        session_id = %session_id,
                        status = %response.status(),
                        "Analysis service rejected trigger"
                    );
                }
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Failed to trigger analysis");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(AnalysisTrigger::new("http://localhost:3001/").base_url(), "http://localhost:3001");
    }

    #[tokio::test]
    async fn test_unreachable_service_does_not_panic() {
        let trigger = AnalysisTrigger::new("http://127.0.0.1:9");
        let handle = trigger.fire(Uuid::new_v4());
        assert!(handle.await.is_ok());
    }
}

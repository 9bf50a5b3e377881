use reqwest::Client;
use std::time::Duration;

use crate::ports::{EngineEvent, Notifier};

/// Posts each event as JSON to an alert endpoint. Delivery is best effort:
/// every POST runs on its own task and failures are only logged.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: EngineEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Webhook event dropped: no async runtime");
            return;
        };

        let request = self.client.post(&self.url).json(&event);
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!("Webhook rejected event: {}", response.status());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Webhook delivery failed: {}", e),
            }
        });
    }
}

//! Webhook notification sink: POSTs reminders as JSON to a configured URL.

use std::time::Duration;

use async_trait::async_trait;
use taskpulse_core::config::NotifyConfig;
use taskpulse_core::error::{Result, TaskPulseError};
use taskpulse_core::traits::NotificationSink;

pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl WebhookSink {
    pub fn new(url: &str, headers: Vec<(String, String)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            headers,
        }
    }

    /// `None` when no webhook is configured.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        let url = config.webhook_url.as_deref().filter(|u| !u.is_empty())?;
        Some(Self::new(url, config.webhook_headers.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn payload(title: &str, body: &str, tag: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "body": body,
        "tag": tag,
        "source": "taskpulse",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, title: &str, body: &str, tag: &str) -> Result<()> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&payload(title, body, tag))
            .timeout(Duration::from_secs(10));
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TaskPulseError::Notify(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Webhook notification sent to {}: {}", self.url, title);
            Ok(())
        } else {
            Err(TaskPulseError::Notify(format!("Webhook error {}", resp.status())))
        }
    }
}

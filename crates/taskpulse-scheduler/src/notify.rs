//! Notification router: fans a reminder out to every registered sink.
//! No queues: each sink is tried once, failures are logged and skipped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskpulse_core::error::Result;
use taskpulse_core::traits::NotificationSink;

const HISTORY_LIMIT: usize = 100;

/// A notification as delivered to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Deduplication tag, the task id for reminders.
    pub tag: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Sinks that accepted it.
    pub delivered_to: Vec<String>,
}

pub struct NotifyRouter {
    sinks: Vec<Arc<dyn NotificationSink>>,
    /// In-memory ring buffer, max 100.
    history: Mutex<VecDeque<Notification>>,
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn register(&mut self, sink: Arc<dyn NotificationSink>) {
        tracing::debug!("🔔 Notification sink registered: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver to every sink. Returns how many accepted it; zero is not an
    /// error (notifications are best effort).
    pub async fn notify(&self, title: &str, body: &str, tag: &str) -> usize {
        let mut delivered_to = Vec::new();
        for sink in &self.sinks {
            match sink.notify(title, body, tag).await {
                Ok(()) => delivered_to.push(sink.name().to_string()),
                Err(e) => tracing::warn!("⚠️ Notification via {} unavailable: {e}", sink.name()),
            }
        }
        let count = delivered_to.len();
        self.record(Notification {
            title: title.to_string(),
            body: body.to_string(),
            tag: tag.to_string(),
            timestamp: chrono::Utc::now(),
            delivered_to,
        });
        count
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        match self.history.lock() {
            Ok(history) => history.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn record(&self, notification: Notification) {
        let Ok(mut history) = self.history.lock() else {
            return;
        };
        history.push_back(notification);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }
}

/// Sink that writes notifications to the log. Always available.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, title: &str, body: &str, tag: &str) -> Result<()> {
        tracing::info!("🔔 {title}: {body} [{tag}]");
        Ok(())
    }
}

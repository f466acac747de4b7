//! REST task store: the web backend's `/tasks` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use taskpulse_core::config::StoreConfig;
use taskpulse_core::error::{Result, TaskPulseError};
use taskpulse_core::task::{Task, TaskPatch};
use taskpulse_core::traits::TaskStore;

pub struct RestTaskStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestTaskStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("TaskPulse/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| TaskPulseError::Store(format!("Client error: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

/// Reject non-2xx responses, keeping status and body for the error.
async fn check(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(TaskPulseError::Store(format!("{context} error {status}: {body}")))
}

/// Accept `{"tasks": [...]}` or a bare array. Entries that do not parse as
/// tasks are skipped with a warning.
fn parse_task_list(body: serde_json::Value) -> Result<Vec<Task>> {
    let items = match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("tasks") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Err(TaskPulseError::Store("Task list response has no 'tasks' array".into())),
        },
        _ => return Err(TaskPulseError::Store("Unexpected task list response".into())),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Task>(item) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed task: {e}");
                None
            }
        })
        .collect())
}

#[async_trait]
impl TaskStore for RestTaskStore {
    fn name(&self) -> &str {
        "rest"
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let resp = self
            .authorize(self.client.get(format!("{}/tasks", self.base_url)))
            .send()
            .await
            .map_err(|e| TaskPulseError::Store(format!("List tasks failed: {e}")))?;
        let body: serde_json::Value = check(resp, "List tasks")
            .await?
            .json()
            .await
            .map_err(|e| TaskPulseError::Store(format!("Invalid task list response: {e}")))?;
        let tasks = parse_task_list(body)?;
        tracing::debug!("📋 Loaded {} task(s) from {}", tasks.len(), self.base_url);
        Ok(tasks)
    }

    async fn patch(&self, task_id: &str, patch: &TaskPatch) -> Result<()> {
        let resp = self
            .authorize(self.client.patch(format!("{}/tasks/{task_id}", self.base_url)))
            .json(patch)
            .send()
            .await
            .map_err(|e| TaskPulseError::Store(format!("Update task {task_id} failed: {e}")))?;
        check(resp, &format!("Update task {task_id}")).await?;
        tracing::debug!("📝 Patched task {task_id}");
        Ok(())
    }
}

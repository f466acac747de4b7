//! Persisted layout of the timer registry.
//!
//! ```json
//! { "task-1": { "status": "active", "elapsedSeconds": 42,
//!               "startTime": "...", "actualStart": "..." } }
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a timed task. Absence of a record means "not timed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Active,
    Paused,
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerStatus::Active => write!(f, "active"),
            TimerStatus::Paused => write!(f, "paused"),
        }
    }
}

/// One persisted timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTimer {
    pub status: TimerStatus,
    #[serde(default)]
    pub elapsed_seconds: u64,
    pub start_time: DateTime<Local>,
    #[serde(default)]
    pub actual_start: Option<DateTime<Local>>,
}

/// Snapshot keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerSnapshot(pub BTreeMap<String, PersistedTimer>);

impl TimerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, task_id: &str) -> Option<&PersistedTimer> {
        self.0.get(task_id)
    }
}

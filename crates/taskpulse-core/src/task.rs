//! Task definitions, as owned and served by the external task store.
//!
//! The core never mutates a `Task`; it reads snapshots and sends `TaskPatch`es.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::time::serde_local_opt;

/// Estimate used when a task carries none.
pub const DEFAULT_ESTIMATE_MINUTES: i64 = 30;

/// Longest span a single task may claim; larger estimates are capped.
pub const MAX_ESTIMATE_MINUTES: i64 = 24 * 60;

/// A task snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Category tag (informational only).
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
    #[serde(default)]
    pub actual_minutes: Option<i64>,
    #[serde(default, with = "serde_local_opt")]
    pub scheduled_start: Option<NaiveDateTime>,
    #[serde(default, with = "serde_local_opt")]
    pub scheduled_end: Option<NaiveDateTime>,
    #[serde(default, with = "serde_local_opt")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default, with = "serde_local_opt")]
    pub actual_start: Option<NaiveDateTime>,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Blocked,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
            TaskStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl Task {
    /// Create a pending task with only an id and a title.
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            domain: None,
            status: TaskStatus::Pending,
            priority: None,
            estimated_minutes: None,
            actual_minutes: None,
            scheduled_start: None,
            scheduled_end: None,
            completed_at: None,
            actual_start: None,
        }
    }

    /// Set the planned start, deriving the end from the estimate.
    pub fn scheduled_at(mut self, start: NaiveDateTime) -> Self {
        self.scheduled_start = Some(start);
        self.scheduled_end = Some(start + Duration::minutes(self.estimate_minutes()));
        self
    }

    pub fn with_estimate(mut self, minutes: i64) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Positive estimate in minutes, falling back to the default and capped at one day.
    pub fn estimate_minutes(&self) -> i64 {
        match self.estimated_minutes {
            Some(m) if m > 0 => m.min(MAX_ESTIMATE_MINUTES),
            _ => DEFAULT_ESTIMATE_MINUTES,
        }
    }

    /// Pending or in progress.
    pub fn is_open(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
    }

    /// The time range this task claims, if it has a planned start.
    pub fn planned_interval(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.scheduled_start?;
        let end = self
            .scheduled_end
            .filter(|end| *end > start)
            .unwrap_or_else(|| start + Duration::minutes(self.estimate_minutes()));
        Some((start, end))
    }
}

/// Partial update sent to the task store. Only present fields are serialised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_minutes: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_local_opt"
    )]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_local_opt"
    )]
    pub actual_start: Option<NaiveDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_local_opt"
    )]
    pub scheduled_start: Option<NaiveDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_local_opt"
    )]
    pub scheduled_end: Option<NaiveDateTime>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn actual_minutes(minutes: i64) -> Self {
        Self { actual_minutes: Some(minutes), ..Self::default() }
    }

    pub fn completed_at(at: NaiveDateTime) -> Self {
        Self { completed_at: Some(at), ..Self::default() }
    }

    pub fn actual_start(at: NaiveDateTime) -> Self {
        Self { actual_start: Some(at), ..Self::default() }
    }

    pub fn schedule(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            scheduled_start: Some(start),
            scheduled_end: Some(end),
            ..Self::default()
        }
    }

    /// Apply this patch to a local task copy (used by in-memory stores).
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(minutes) = self.actual_minutes {
            task.actual_minutes = Some(minutes);
        }
        if let Some(at) = self.completed_at {
            task.completed_at = Some(at);
        }
        if let Some(at) = self.actual_start {
            task.actual_start = Some(at);
        }
        if let Some(at) = self.scheduled_start {
            task.scheduled_start = Some(at);
        }
        if let Some(at) = self.scheduled_end {
            task.scheduled_end = Some(at);
        }
    }
}

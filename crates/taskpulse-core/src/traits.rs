//! Collaborator traits: the seams between the core and the outside world.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::snapshot::TimerSnapshot;
use crate::task::{Task, TaskPatch};

/// CRUD access to the external task list.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetch the full task list.
    async fn list(&self) -> Result<Vec<Task>>;

    /// Apply a partial update to one task.
    async fn patch(&self, task_id: &str, patch: &TaskPatch) -> Result<()>;
}

/// Durable key-value storage for the timer registry.
///
/// Synchronous on purpose: saves happen inside registry transitions, which
/// run to completion.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<TimerSnapshot>;
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn load(&self) -> Result<TimerSnapshot> {
        (**self).load()
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        (**self).save(snapshot)
    }
}

/// System notification delivery. May be unavailable (permission denied,
/// endpoint down); callers treat failures as non-fatal.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, title: &str, body: &str, tag: &str) -> Result<()>;
}

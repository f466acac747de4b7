//! In-memory task store for `--offline` sessions and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use taskpulse_core::error::{Result, TaskPulseError};
use taskpulse_core::task::{Task, TaskPatch};
use taskpulse_core::traits::TaskStore;

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    patches: Mutex<Vec<(String, TaskPatch)>>,
    failing: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    /// Make every list and patch fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Add or replace a task by id.
    pub fn upsert(&self, task: Task) {
        if let Ok(mut tasks) = self.tasks.lock() {
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => tasks.push(task),
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks
            .lock()
            .ok()
            .and_then(|tasks| tasks.iter().find(|t| t.id == task_id).cloned())
    }

    /// Every patch received, in order.
    pub fn patches(&self) -> Vec<(String, TaskPatch)> {
        self.patches.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(TaskPulseError::Store("task store unavailable".into()));
        }
        Ok(())
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> TaskPulseError {
    TaskPulseError::Store(format!("Lock poisoned: {e}"))
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<Task>> {
        self.check_available()?;
        Ok(self.tasks.lock().map_err(poisoned)?.clone())
    }

    async fn patch(&self, task_id: &str, patch: &TaskPatch) -> Result<()> {
        self.check_available()?;
        {
            let mut tasks = self.tasks.lock().map_err(poisoned)?;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| TaskPulseError::Store(format!("Task not found: {task_id}")))?;
            patch.apply_to(task);
        }
        self.patches
            .lock()
            .map_err(poisoned)?
            .push((task_id.to_string(), patch.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpulse_core::task::TaskStatus;

    #[tokio::test]
    async fn test_patch_updates_and_records() {
        let store = MemoryTaskStore::new(vec![Task::new("t1", "Write")]);
        store
            .patch("t1", &TaskPatch::status(TaskStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(store.get("t1").unwrap().status, TaskStatus::InProgress);
        assert_eq!(store.patches().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_task_rejected() {
        let store = MemoryTaskStore::default();
        let err = store.patch("ghost", &TaskPatch::actual_minutes(3)).await;
        assert!(matches!(err, Err(TaskPulseError::Store(_))));
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_failing_switch() {
        let store = MemoryTaskStore::new(vec![Task::new("t1", "Write")]);
        store.set_failing(true);
        assert!(store.list().await.is_err());
        assert!(store.patch("t1", &TaskPatch::actual_minutes(1)).await.is_err());
        store.set_failing(false);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryTaskStore::new(vec![Task::new("t1", "Old")]);
        store.upsert(Task::new("t1", "New"));
        store.upsert(Task::new("t2", "Other"));
        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(store.get("t1").unwrap().title, "New");
    }
}

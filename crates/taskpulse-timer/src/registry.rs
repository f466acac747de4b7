//! Timer registry: the single writer of per-task timer state.
//!
//! Pure state machine: no clocks, no I/O besides the best-effort snapshot
//! save after each transition. Time is passed in by the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use taskpulse_core::snapshot::{PersistedTimer, TimerSnapshot, TimerStatus};
use taskpulse_core::task::{Task, TaskStatus};
use taskpulse_core::traits::SnapshotStore;

/// Per-task timer state.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRecord {
    pub task_id: String,
    pub status: TimerStatus,
    /// Seconds spent Active. Never decreases.
    pub elapsed_seconds: u64,
    /// First Active transition.
    pub started_at: DateTime<Local>,
    /// Reported back to the task store as `actual_start`.
    pub actual_start: Option<DateTime<Local>>,
}

impl TimerRecord {
    fn to_persisted(&self) -> PersistedTimer {
        PersistedTimer {
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            start_time: self.started_at,
            actual_start: self.actual_start,
        }
    }

    fn from_persisted(task_id: &str, timer: &PersistedTimer) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: timer.status,
            elapsed_seconds: timer.elapsed_seconds,
            started_at: timer.start_time,
            actual_start: timer.actual_start,
        }
    }
}

/// Rejected command. Never user-visible; callers log and move on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no timer for task {0}")]
    UnknownTask(String),
    #[error("cannot {command} task {task_id}: timer is {status}")]
    InvalidTransition {
        task_id: String,
        command: &'static str,
        status: TimerStatus,
    },
}

/// Result of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// New record created.
    Started,
    /// Paused record switched back to Active.
    Resumed,
    /// No-op.
    AlreadyRunning,
}

/// What `stop` hands to the task store.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub task_id: String,
    pub elapsed_seconds: u64,
    /// `ceil(elapsed_seconds / 60)`.
    pub actual_minutes: i64,
    pub completed_at: DateTime<Local>,
    pub started_at: DateTime<Local>,
    pub actual_start: Option<DateTime<Local>>,
}

/// Display value for one timer, emitted on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerReading {
    pub task_id: String,
    pub elapsed_seconds: u64,
    pub status: TimerStatus,
}

/// Owns every `TimerRecord`.
pub struct TimerRegistry {
    records: BTreeMap<String, TimerRecord>,
    store: Box<dyn SnapshotStore>,
}

impl TimerRegistry {
    /// Empty registry backed by `store`. Nothing is loaded.
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self {
            records: BTreeMap::new(),
            store,
        }
    }

    /// Registry restored from the last saved snapshot.
    /// An unreadable snapshot yields an empty registry.
    pub fn restore(store: Box<dyn SnapshotStore>) -> Self {
        let records = match store.load() {
            Ok(snapshot) => snapshot
                .0
                .iter()
                .map(|(id, timer)| (id.clone(), TimerRecord::from_persisted(id, timer)))
                .collect(),
            Err(e) => {
                tracing::warn!("⚠️ Failed to restore timers, starting empty: {e}");
                BTreeMap::new()
            }
        };
        let registry = Self { records, store };
        tracing::info!(
            "⏱️ Restored {} timer(s), {} active",
            registry.records.len(),
            registry.active_count()
        );
        registry
    }

    /// None → Active, Paused → Active, Active → no-op.
    pub fn start(&mut self, task_id: &str, now: DateTime<Local>) -> StartOutcome {
        let outcome = match self.records.get_mut(task_id) {
            Some(record) if record.status == TimerStatus::Active => StartOutcome::AlreadyRunning,
            Some(record) => {
                record.status = TimerStatus::Active;
                StartOutcome::Resumed
            }
            None => {
                self.records.insert(
                    task_id.to_string(),
                    TimerRecord {
                        task_id: task_id.to_string(),
                        status: TimerStatus::Active,
                        elapsed_seconds: 0,
                        started_at: now,
                        actual_start: Some(now),
                    },
                );
                StartOutcome::Started
            }
        };
        if outcome != StartOutcome::AlreadyRunning {
            tracing::info!("▶️ Timer {:?}: {task_id}", outcome);
            self.persist();
        }
        outcome
    }

    /// Active → Paused.
    pub fn pause(&mut self, task_id: &str) -> Result<u64, TransitionError> {
        let elapsed = self.transition(task_id, "pause", TimerStatus::Active, TimerStatus::Paused)?;
        tracing::info!("⏸️ Timer paused: {task_id} at {elapsed}s");
        Ok(elapsed)
    }

    /// Paused → Active.
    pub fn resume(&mut self, task_id: &str) -> Result<u64, TransitionError> {
        let elapsed = self.transition(task_id, "resume", TimerStatus::Paused, TimerStatus::Active)?;
        tracing::info!("▶️ Timer resumed: {task_id} at {elapsed}s");
        Ok(elapsed)
    }

    fn transition(
        &mut self,
        task_id: &str,
        command: &'static str,
        from: TimerStatus,
        to: TimerStatus,
    ) -> Result<u64, TransitionError> {
        let record = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| TransitionError::UnknownTask(task_id.to_string()))?;
        if record.status != from {
            return Err(TransitionError::InvalidTransition {
                task_id: task_id.to_string(),
                command,
                status: record.status,
            });
        }
        record.status = to;
        let elapsed = record.elapsed_seconds;
        self.persist();
        Ok(elapsed)
    }

    /// Active or Paused → removed. The record is gone before the caller
    /// gets the report, so a second stop is always `UnknownTask`.
    pub fn stop(
        &mut self,
        task_id: &str,
        now: DateTime<Local>,
    ) -> Result<CompletionReport, TransitionError> {
        let record = self
            .records
            .remove(task_id)
            .ok_or_else(|| TransitionError::UnknownTask(task_id.to_string()))?;
        self.persist();

        let report = CompletionReport {
            task_id: record.task_id,
            elapsed_seconds: record.elapsed_seconds,
            actual_minutes: record.elapsed_seconds.div_ceil(60) as i64,
            completed_at: now,
            started_at: record.started_at,
            actual_start: record.actual_start,
        };
        tracing::info!(
            "⏹️ Timer stopped: {task_id} after {}s ({} min)",
            report.elapsed_seconds,
            report.actual_minutes
        );
        Ok(report)
    }

    /// One second of wall time: Active timers advance, Paused ones re-report.
    pub fn tick(&mut self) -> Vec<TimerReading> {
        self.records
            .values_mut()
            .map(|record| {
                if record.status == TimerStatus::Active {
                    record.elapsed_seconds = record.elapsed_seconds.saturating_add(1);
                }
                TimerReading {
                    task_id: record.task_id.clone(),
                    elapsed_seconds: record.elapsed_seconds,
                    status: record.status,
                }
            })
            .collect()
    }

    /// Drop timers whose task the store already reports as completed.
    /// Returns the removed task ids.
    pub fn forget_completed(&mut self, tasks: &[Task]) -> Vec<String> {
        let completed: Vec<String> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && self.records.contains_key(&t.id))
            .map(|t| t.id.clone())
            .collect();
        if completed.is_empty() {
            return completed;
        }
        for id in &completed {
            self.records.remove(id);
            tracing::info!("🧹 Timer dropped, task completed elsewhere: {id}");
        }
        self.persist();
        completed
    }

    pub fn get(&self, task_id: &str) -> Option<&TimerRecord> {
        self.records.get(task_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &TimerRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == TimerStatus::Active)
            .count()
    }

    pub fn has_active(&self) -> bool {
        self.active_count() > 0
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot(
            self.records
                .iter()
                .map(|(id, record)| (id.clone(), record.to_persisted()))
                .collect(),
        )
    }

    /// Best-effort save; the in-memory state stays authoritative.
    pub fn persist(&self) {
        if let Err(e) = self.store.save(&self.snapshot()) {
            tracing::warn!("⚠️ Failed to persist timers: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotStore;
    use std::sync::Arc;

    fn registry() -> (TimerRegistry, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::new());
        (TimerRegistry::new(Box::new(store.clone())), store)
    }

    #[test]
    fn test_start_creates_active_record() {
        let (mut reg, store) = registry();
        let now = Local::now();
        assert_eq!(reg.start("t1", now), StartOutcome::Started);
        let record = reg.get("t1").unwrap();
        assert_eq!(record.status, TimerStatus::Active);
        assert_eq!(record.elapsed_seconds, 0);
        assert_eq!(record.started_at, now);
        assert_eq!(store.saved().unwrap().len(), 1);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut reg, store) = registry();
        reg.start("t1", Local::now());
        reg.tick();
        let saves = store.save_count();
        assert_eq!(reg.start("t1", Local::now()), StartOutcome::AlreadyRunning);
        assert_eq!(reg.get("t1").unwrap().elapsed_seconds, 1);
        assert_eq!(store.save_count(), saves);
    }

    #[test]
    fn test_start_on_paused_resumes() {
        let (mut reg, _) = registry();
        let first = Local::now();
        reg.start("t1", first);
        reg.pause("t1").unwrap();
        assert_eq!(reg.start("t1", Local::now()), StartOutcome::Resumed);
        assert_eq!(reg.get("t1").unwrap().status, TimerStatus::Active);
        assert_eq!(reg.get("t1").unwrap().started_at, first);
    }

    #[test]
    fn test_invalid_transitions() {
        let (mut reg, _) = registry();
        assert_eq!(
            reg.pause("ghost"),
            Err(TransitionError::UnknownTask("ghost".into()))
        );
        reg.start("t1", Local::now());
        assert!(matches!(
            reg.resume("t1"),
            Err(TransitionError::InvalidTransition { command: "resume", .. })
        ));
        reg.pause("t1").unwrap();
        assert!(matches!(
            reg.pause("t1"),
            Err(TransitionError::InvalidTransition { status: TimerStatus::Paused, .. })
        ));
    }

    #[test]
    fn test_elapsed_frozen_while_paused() {
        let (mut reg, _) = registry();
        reg.start("t1", Local::now());
        let mut last = 0;
        for step in 0..20 {
            if step == 5 {
                reg.pause("t1").unwrap();
            }
            if step == 12 {
                reg.resume("t1").unwrap();
            }
            let reading = reg.tick().remove(0);
            assert!(reading.elapsed_seconds >= last);
            if (5..12).contains(&step) {
                assert_eq!(reading.elapsed_seconds, last);
                assert_eq!(reading.status, TimerStatus::Paused);
            }
            last = reading.elapsed_seconds;
        }
        // 5 ticks before pause + 8 ticks after resume
        assert_eq!(last, 13);
    }

    #[test]
    fn test_start_pause_resume_stop_counts_active_only() {
        let (mut reg, _) = registry();
        reg.start("t1", Local::now());
        reg.tick();
        reg.pause("t1").unwrap();
        reg.tick();
        reg.resume("t1").unwrap();
        reg.tick();
        let report = reg.stop("t1", Local::now()).unwrap();
        assert_eq!(report.elapsed_seconds, 2);
        assert_eq!(report.actual_minutes, 1);
    }

    #[test]
    fn test_actual_minutes_rounds_up() {
        let (mut reg, _) = registry();
        reg.start("t1", Local::now());
        for _ in 0..61 {
            reg.tick();
        }
        assert_eq!(reg.stop("t1", Local::now()).unwrap().actual_minutes, 2);

        reg.start("t2", Local::now());
        for _ in 0..120 {
            reg.tick();
        }
        assert_eq!(reg.stop("t2", Local::now()).unwrap().actual_minutes, 2);

        reg.start("t3", Local::now());
        assert_eq!(reg.stop("t3", Local::now()).unwrap().actual_minutes, 0);
    }

    #[test]
    fn test_stop_twice_reports_once() {
        let (mut reg, store) = registry();
        reg.start("t1", Local::now());
        reg.pause("t1").unwrap();
        assert!(reg.stop("t1", Local::now()).is_ok());
        assert_eq!(
            reg.stop("t1", Local::now()),
            Err(TransitionError::UnknownTask("t1".into()))
        );
        assert!(reg.is_empty());
        assert!(store.saved().unwrap().is_empty());
    }

    #[test]
    fn test_persist_failure_does_not_block_transition() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.set_failing(true);
        let mut reg = TimerRegistry::new(Box::new(store.clone()));
        assert_eq!(reg.start("t1", Local::now()), StartOutcome::Started);
        assert!(reg.pause("t1").is_ok());
        assert_eq!(reg.get("t1").unwrap().status, TimerStatus::Paused);

        store.set_failing(false);
        reg.resume("t1").unwrap();
        assert_eq!(store.saved().unwrap().get("t1").unwrap().status, TimerStatus::Active);
    }

    #[test]
    fn test_restore_round_trip() {
        let store = Arc::new(MemorySnapshotStore::new());
        {
            let mut reg = TimerRegistry::new(Box::new(store.clone()));
            reg.start("a", Local::now());
            reg.start("b", Local::now());
            reg.tick();
            reg.pause("b").unwrap();
        }
        let reg = TimerRegistry::restore(Box::new(store.clone()));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.active_count(), 1);
        assert_eq!(reg.get("b").unwrap().elapsed_seconds, 1);
    }

    #[test]
    fn test_forget_completed() {
        let (mut reg, _) = registry();
        reg.start("done", Local::now());
        reg.start("open", Local::now());
        let tasks = vec![
            Task::new("done", "x").with_status(TaskStatus::Completed),
            Task::new("open", "y").with_status(TaskStatus::InProgress),
            Task::new("untimed", "z").with_status(TaskStatus::Completed),
        ];
        assert_eq!(reg.forget_completed(&tasks), vec!["done".to_string()]);
        assert!(reg.get("done").is_none());
        assert!(reg.get("open").is_some());
    }
}

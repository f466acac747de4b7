//! Auto-scheduler: picks a slot for one task against the live task list.

use std::sync::Arc;

use chrono::NaiveDateTime;
use taskpulse_core::config::{SchedulerConfig, WorkWindow};
use taskpulse_core::error::Result;
use taskpulse_core::task::{Task, TaskPatch, TaskStatus};
use taskpulse_core::traits::TaskStore;

use crate::history::{HistoryEntry, ScheduleHistory};
use crate::slot::{OccupiedInterval, ScheduleRequest, Slot, SlotRules, compute_slot_with, effective_duration, fallback_slot};

pub struct AutoScheduler {
    store: Arc<dyn TaskStore>,
    window: WorkWindow,
    rules: SlotRules,
    history: ScheduleHistory,
}

impl AutoScheduler {
    pub fn new(store: Arc<dyn TaskStore>, window: WorkWindow, rules: SlotRules, history: ScheduleHistory) -> Self {
        Self {
            store,
            window,
            rules,
            history,
        }
    }

    /// Scheduler with file-backed history, as configured.
    pub fn from_config(store: Arc<dyn TaskStore>, window: WorkWindow, config: &SchedulerConfig) -> Self {
        let history = ScheduleHistory::open(&config.resolved_history_path(), config.history_limit);
        Self::new(store, window, SlotRules::from(config), history)
    }

    pub fn history(&self) -> &ScheduleHistory {
        &self.history
    }

    /// Propose a slot for `task`. Every other unfinished task with a planned
    /// start counts as busy. If the task list cannot be read, falls back to
    /// `now` rounded up and logs the failure.
    pub async fn schedule_task(&mut self, task: &Task, now: NaiveDateTime) -> Slot {
        let duration = effective_duration(task.estimated_minutes.unwrap_or(0), &self.rules);
        match self.store.list().await {
            Ok(tasks) => {
                let request = ScheduleRequest {
                    duration_minutes: duration,
                    domain: task.domain.clone(),
                    occupied: occupied_by_others(&tasks, &task.id),
                };
                let start = compute_slot_with(&request, &self.window, &self.rules, now);
                self.history
                    .record(HistoryEntry::new(task.domain.as_deref(), start, duration));
                tracing::info!(
                    "📅 Slot for '{}': {} ({} min, {} busy interval(s))",
                    task.title,
                    start,
                    duration,
                    request.occupied.len()
                );
                Slot::new(start, duration)
            }
            Err(e) => {
                tracing::warn!("⚠️ Task list unavailable from {}, using fallback slot: {e}", self.store.name());
                Slot::new(fallback_slot(now, &self.rules), duration)
            }
        }
    }

    /// Choose a slot and write it to the task's planned start and end.
    pub async fn apply(&mut self, task: &Task, now: NaiveDateTime) -> Result<Slot> {
        let slot = self.schedule_task(task, now).await;
        self.store
            .patch(&task.id, &TaskPatch::schedule(slot.start, slot.end))
            .await?;
        Ok(slot)
    }
}

/// Planned intervals of every task except `task_id` that still needs doing.
pub fn occupied_by_others(tasks: &[Task], task_id: &str) -> Vec<OccupiedInterval> {
    tasks
        .iter()
        .filter(|t| t.id != task_id)
        .filter(|t| !matches!(t.status, TaskStatus::Completed | TaskStatus::Cancelled))
        .filter_map(Task::planned_interval)
        .map(|(start, end)| OccupiedInterval::new(start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use taskpulse_core::error::TaskPulseError;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[derive(Default)]
    struct FakeStore {
        tasks: Vec<Task>,
        failing: bool,
        patches: Mutex<Vec<(String, TaskPatch)>>,
    }

    #[async_trait]
    impl TaskStore for FakeStore {
        fn name(&self) -> &str {
            "fake"
        }

        async fn list(&self) -> Result<Vec<Task>> {
            if self.failing {
                return Err(TaskPulseError::Store("offline".into()));
            }
            Ok(self.tasks.clone())
        }

        async fn patch(&self, task_id: &str, patch: &TaskPatch) -> Result<()> {
            self.patches.lock().unwrap().push((task_id.to_string(), patch.clone()));
            Ok(())
        }
    }

    fn scheduler(store: Arc<FakeStore>) -> AutoScheduler {
        AutoScheduler::new(store, WorkWindow::default(), SlotRules::default(), ScheduleHistory::new(100))
    }

    #[tokio::test]
    async fn test_avoids_other_tasks() {
        let store = Arc::new(FakeStore {
            tasks: vec![
                Task::new("busy", "Standup").scheduled_at(at(14, 30)).with_estimate(30),
                Task::new("done", "Old")
                    .scheduled_at(at(15, 0))
                    .with_status(TaskStatus::Completed),
            ],
            ..Default::default()
        });
        let mut auto = scheduler(store);
        let task = Task::new("new", "Write report").with_estimate(20).with_domain("work");

        let slot = auto.schedule_task(&task, at(14, 0)).await;
        assert_eq!(slot.start, at(15, 0));
        assert_eq!(slot.end, at(15, 20));

        let recorded: Vec<_> = auto.history().entries().cloned().collect();
        assert_eq!(recorded, vec![HistoryEntry::new(Some("work"), at(15, 0), 20)]);
    }

    #[tokio::test]
    async fn test_huge_estimates_do_not_panic() {
        let mut busy = Task::new("busy", "Retreat").with_estimate(i64::MAX / 10);
        busy.scheduled_start = Some(at(16, 0));
        let occupied = occupied_by_others(std::slice::from_ref(&busy), "new");
        let day = chrono::Duration::days(1);
        assert_eq!(occupied, vec![OccupiedInterval::new(at(16, 0), at(16, 0) + day)]);

        let mut auto = scheduler(Arc::new(FakeStore {
            tasks: vec![busy],
            ..Default::default()
        }));
        let task = Task::new("new", "Thesis").with_estimate(i64::MAX);
        let slot = auto.schedule_task(&task, at(14, 0)).await;
        assert_eq!(slot.start, at(16, 0) + day);
        assert_eq!(slot.end - slot.start, day);
    }

    #[tokio::test]
    async fn test_own_interval_is_ignored() {
        let store = Arc::new(FakeStore {
            tasks: vec![Task::new("t", "Reschedule me").scheduled_at(at(14, 30))],
            ..Default::default()
        });
        let mut auto = scheduler(store);
        let task = Task::new("t", "Reschedule me");
        assert_eq!(auto.schedule_task(&task, at(14, 0)).await.start, at(14, 30));
    }

    #[tokio::test]
    async fn test_store_failure_falls_back() {
        let store = Arc::new(FakeStore {
            failing: true,
            ..Default::default()
        });
        let mut auto = scheduler(store);
        let slot = auto.schedule_task(&Task::new("t", "Anything"), at(14, 7)).await;
        assert_eq!(slot.start, at(14, 15));
        assert_eq!(slot.end, at(14, 45));
        assert!(auto.history().is_empty());
    }

    #[tokio::test]
    async fn test_apply_patches_task() {
        let store = Arc::new(FakeStore::default());
        let mut auto = scheduler(store.clone());
        let task = Task::new("t", "Plan").with_estimate(45);
        let slot = auto.apply(&task, at(10, 0)).await.unwrap();

        let patches = store.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, "t");
        assert_eq!(patches[0].1, TaskPatch::schedule(slot.start, at(11, 15)));
    }
}

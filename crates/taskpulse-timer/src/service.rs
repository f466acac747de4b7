//! Timer service: the async façade the host talks to.
//!
//! Wraps the registry and the tick source, turns registry transitions into
//! core events, and runs the task-store follow-ups (mark in progress, report
//! completion) as fire-and-forget tasks that end with `RefreshRequested`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Local;
use taskpulse_core::config::TimerConfig;
use taskpulse_core::events::{CoreEvent, EventBus, NoticeLevel};
use taskpulse_core::snapshot::{TimerSnapshot, TimerStatus};
use taskpulse_core::task::{Task, TaskPatch, TaskStatus};
use taskpulse_core::time::format_elapsed;
use taskpulse_core::traits::{SnapshotStore, TaskStore};
use tokio::sync::Mutex;

use crate::clock::TickSource;
use crate::registry::{CompletionReport, StartOutcome, TimerRegistry};

pub struct TimerService {
    registry: Arc<Mutex<TimerRegistry>>,
    clock: Mutex<TickSource>,
    task_store: Arc<dyn TaskStore>,
    events: EventBus,
    persist_every_ticks: u32,
}

impl TimerService {
    /// Restore the registry from `snapshots` and resume ticking if any
    /// restored timer is active.
    pub async fn restore(
        snapshots: Box<dyn SnapshotStore>,
        task_store: Arc<dyn TaskStore>,
        events: EventBus,
        config: &TimerConfig,
    ) -> Self {
        let service = Self {
            registry: Arc::new(Mutex::new(TimerRegistry::restore(snapshots))),
            clock: Mutex::new(TickSource::new(Duration::from_millis(config.tick_millis.max(1)))),
            task_store,
            events,
            persist_every_ticks: config.persist_every_ticks.max(1),
        };
        service.sync_clock().await;
        service
    }

    /// Start (or resume) timing a task.
    pub async fn start(&self, task_id: &str) -> StartOutcome {
        let (outcome, elapsed) = {
            let mut registry = self.registry.lock().await;
            let outcome = registry.start(task_id, Local::now());
            let elapsed = registry.get(task_id).map_or(0, |r| r.elapsed_seconds);
            (outcome, elapsed)
        };

        match outcome {
            StartOutcome::AlreadyRunning => {
                self.events
                    .notice(NoticeLevel::Info, format!("Task {task_id} is already being timed"));
                return outcome;
            }
            StartOutcome::Started => {
                self.spawn_mark_in_progress(task_id);
                self.events
                    .notice(NoticeLevel::Success, format!("Started task {task_id}"));
            }
            StartOutcome::Resumed => {
                self.events
                    .notice(NoticeLevel::Success, format!("Resumed task {task_id}"));
            }
        }

        self.emit_changed(task_id, Some(TimerStatus::Active), elapsed);
        self.sync_clock().await;
        outcome
    }

    /// Pause an active timer. Unknown or non-active timers are ignored.
    pub async fn pause(&self, task_id: &str) -> bool {
        let result = self.registry.lock().await.pause(task_id);
        match result {
            Ok(elapsed) => {
                self.emit_changed(task_id, Some(TimerStatus::Paused), elapsed);
                self.events
                    .notice(NoticeLevel::Info, format!("Paused task {task_id}"));
                self.sync_clock().await;
                true
            }
            Err(e) => {
                tracing::debug!("Ignored pause: {e}");
                false
            }
        }
    }

    /// Resume a paused timer. Unknown or non-paused timers are ignored.
    pub async fn resume(&self, task_id: &str) -> bool {
        let result = self.registry.lock().await.resume(task_id);
        match result {
            Ok(elapsed) => {
                self.emit_changed(task_id, Some(TimerStatus::Active), elapsed);
                self.events
                    .notice(NoticeLevel::Success, format!("Resumed task {task_id}"));
                self.sync_clock().await;
                true
            }
            Err(e) => {
                tracing::debug!("Ignored resume: {e}");
                false
            }
        }
    }

    /// Stop a timer and report completion to the task store.
    ///
    /// The record is removed before the report is sent; a failed report is
    /// surfaced as an error notice and is not rolled back.
    pub async fn stop(&self, task_id: &str) -> Option<CompletionReport> {
        let result = self.registry.lock().await.stop(task_id, Local::now());
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!("Ignored stop: {e}");
                return None;
            }
        };

        self.emit_changed(task_id, None, report.elapsed_seconds);
        self.sync_clock().await;
        self.spawn_report_completion(report.clone());
        Some(report)
    }

    /// Drop timers for tasks the store already reports as completed.
    pub async fn reconcile(&self, tasks: &[Task]) -> Vec<String> {
        let removed = self.registry.lock().await.forget_completed(tasks);
        for task_id in &removed {
            self.emit_changed(task_id, None, 0);
        }
        if !removed.is_empty() {
            self.sync_clock().await;
        }
        removed
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.registry.lock().await.snapshot()
    }

    pub async fn elapsed(&self, task_id: &str) -> Option<(TimerStatus, u64)> {
        self.registry
            .lock()
            .await
            .get(task_id)
            .map(|r| (r.status, r.elapsed_seconds))
    }

    pub async fn is_ticking(&self) -> bool {
        self.clock.lock().await.is_running()
    }

    /// Stop ticking and flush the registry.
    pub async fn shutdown(&self) {
        self.clock.lock().await.release();
        self.registry.lock().await.persist();
    }

    /// Run the tick exactly while some timer is active.
    async fn sync_clock(&self) {
        let should_tick = self.registry.lock().await.has_active();
        let mut clock = self.clock.lock().await;
        if !should_tick {
            clock.release();
            return;
        }

        let registry = self.registry.clone();
        let events = self.events.clone();
        let persist_every = self.persist_every_ticks;
        let ticks = Arc::new(AtomicU32::new(0));
        clock.acquire(move || {
            let registry = registry.clone();
            let events = events.clone();
            let ticks = ticks.clone();
            async move {
                let readings = {
                    let mut registry = registry.lock().await;
                    let readings = registry.tick();
                    let n = ticks.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
                    if n % persist_every == 0 {
                        registry.persist();
                    }
                    readings
                };
                for reading in readings {
                    events.emit(CoreEvent::TimerTick {
                        task_id: reading.task_id,
                        elapsed_seconds: reading.elapsed_seconds,
                        status: reading.status,
                    });
                }
            }
        });
    }

    fn emit_changed(&self, task_id: &str, status: Option<TimerStatus>, elapsed_seconds: u64) {
        self.events.emit(CoreEvent::TimerChanged {
            task_id: task_id.to_string(),
            status,
            elapsed_seconds,
        });
    }

    fn spawn_mark_in_progress(&self, task_id: &str) {
        let store = self.task_store.clone();
        let events = self.events.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store
                .patch(&task_id, &TaskPatch::status(TaskStatus::InProgress))
                .await
            {
                tracing::warn!("⚠️ Failed to mark {task_id} in progress via {}: {e}", store.name());
                events.notice(
                    NoticeLevel::Error,
                    format!("Could not update task {task_id}: {e}"),
                );
            }
            events.emit(CoreEvent::RefreshRequested);
        });
    }

    fn spawn_report_completion(&self, report: CompletionReport) {
        let store = self.task_store.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match report_completion(store.as_ref(), &report).await {
                Ok(()) => events.notice(
                    NoticeLevel::Success,
                    format!(
                        "Task {} completed in {}",
                        report.task_id,
                        format_elapsed(report.elapsed_seconds)
                    ),
                ),
                Err(e) => {
                    tracing::warn!("⚠️ Completion report for {} failed: {e}", report.task_id);
                    events.notice(
                        NoticeLevel::Error,
                        format!("Failed to report completion of {}: {e}", report.task_id),
                    );
                }
            }
            events.emit(CoreEvent::RefreshRequested);
        });
    }
}

/// Send the completion as individual field updates, stopping at the first
/// failure.
pub async fn report_completion(
    store: &dyn TaskStore,
    report: &CompletionReport,
) -> taskpulse_core::Result<()> {
    let mut patches = vec![
        TaskPatch::status(TaskStatus::Completed),
        TaskPatch::actual_minutes(report.actual_minutes),
        TaskPatch::completed_at(report.completed_at.naive_local()),
    ];
    if let Some(actual_start) = report.actual_start {
        patches.push(TaskPatch::actual_start(actual_start.naive_local()));
    }
    for patch in &patches {
        store.patch(&report.task_id, patch).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use taskpulse_core::TaskPulseError;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Records patches; optionally fails every call.
    #[derive(Default)]
    struct RecordingStore {
        patches: std::sync::Mutex<Vec<(String, TaskPatch)>>,
        failing: AtomicBool,
    }

    impl RecordingStore {
        fn patches(&self) -> Vec<(String, TaskPatch)> {
            self.patches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn list(&self) -> taskpulse_core::Result<Vec<Task>> {
            Ok(Vec::new())
        }

        async fn patch(&self, task_id: &str, patch: &TaskPatch) -> taskpulse_core::Result<()> {
            if self.failing.load(Ordering::Relaxed) {
                return Err(TaskPulseError::Store("connection refused".into()));
            }
            self.patches
                .lock()
                .unwrap()
                .push((task_id.to_string(), patch.clone()));
            Ok(())
        }
    }

    async fn service() -> (
        TimerService,
        Arc<RecordingStore>,
        Arc<MemorySnapshotStore>,
        UnboundedReceiver<CoreEvent>,
    ) {
        let store = Arc::new(RecordingStore::default());
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let (events, rx) = EventBus::channel();
        let service = TimerService::restore(
            Box::new(snapshots.clone()),
            store.clone(),
            events,
            &TimerConfig::default(),
        )
        .await;
        (service, store, snapshots, rx)
    }

    async fn wait_for_refresh(rx: &mut UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == CoreEvent::RefreshRequested;
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_marks_in_progress_and_ticks() {
        let (service, store, _, mut rx) = service().await;
        assert!(!service.is_ticking().await);

        assert_eq!(service.start("t1").await, StartOutcome::Started);
        assert!(service.is_ticking().await);
        wait_for_refresh(&mut rx).await;
        assert_eq!(
            store.patches(),
            vec![("t1".to_string(), TaskPatch::status(TaskStatus::InProgress))]
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(service.elapsed("t1").await, Some((TimerStatus::Active, 3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_stops_when_nothing_active() {
        let (service, _, _, _rx) = service().await;
        service.start("a").await;
        service.start("b").await;
        service.pause("a").await;
        assert!(service.is_ticking().await);
        service.pause("b").await;
        assert!(!service.is_ticking().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(service.elapsed("a").await, Some((TimerStatus::Paused, 0)));

        assert!(service.resume("b").await);
        assert!(service.is_ticking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_pause_resume_stop_reports_active_seconds() {
        let (service, store, snapshots, mut rx) = service().await;
        service.start("t1").await;
        wait_for_refresh(&mut rx).await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        service.pause("t1").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        service.resume("t1").await;
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let report = service.stop("t1").await.unwrap();
        assert_eq!(report.elapsed_seconds, 2);
        assert_eq!(report.actual_minutes, 1);
        assert!(service.elapsed("t1").await.is_none());
        assert!(!service.is_ticking().await);
        assert!(snapshots.saved().unwrap().is_empty());

        wait_for_refresh(&mut rx).await;
        let patches: Vec<TaskPatch> = store.patches().into_iter().skip(1).map(|(_, p)| p).collect();
        assert_eq!(patches.len(), 4);
        assert_eq!(patches[0], TaskPatch::status(TaskStatus::Completed));
        assert_eq!(patches[1], TaskPatch::actual_minutes(1));
        assert!(patches[2].completed_at.is_some());
        assert!(patches[3].actual_start.is_some());
    }

    #[tokio::test]
    async fn test_double_stop_reports_once() {
        let (service, store, _, mut rx) = service().await;
        service.start("t1").await;
        wait_for_refresh(&mut rx).await;

        assert!(service.stop("t1").await.is_some());
        assert!(service.stop("t1").await.is_none());
        wait_for_refresh(&mut rx).await;

        let completions = store
            .patches()
            .iter()
            .filter(|(_, p)| p.status == Some(TaskStatus::Completed))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_failed_report_keeps_record_removed() {
        let (service, store, _, mut rx) = service().await;
        service.start("t1").await;
        wait_for_refresh(&mut rx).await;

        store.failing.store(true, Ordering::Relaxed);
        assert!(service.stop("t1").await.is_some());
        let events = wait_for_refresh(&mut rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::Notice { level: NoticeLevel::Error, .. }
        )));
        assert!(service.elapsed("t1").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_commands_are_noops() {
        let (service, store, _, _rx) = service().await;
        assert!(!service.pause("ghost").await);
        assert!(!service.resume("ghost").await);
        assert!(service.stop("ghost").await.is_none());
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_already_running_is_reported() {
        let (service, _, _, mut rx) = service().await;
        service.start("t1").await;
        wait_for_refresh(&mut rx).await;
        while rx.try_recv().is_ok() {}

        assert_eq!(service.start("t1").await, StartOutcome::AlreadyRunning);
        assert!(matches!(
            rx.try_recv().unwrap(),
            CoreEvent::Notice { level: NoticeLevel::Info, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_resumes_ticking() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        {
            let mut registry = TimerRegistry::new(Box::new(snapshots.clone()));
            registry.start("t1", Local::now());
        }
        let (events, _rx) = EventBus::channel();
        let service = TimerService::restore(
            Box::new(snapshots.clone()),
            Arc::new(RecordingStore::default()),
            events,
            &TimerConfig::default(),
        )
        .await;
        assert!(service.is_ticking().await);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(service.elapsed("t1").await, Some((TimerStatus::Active, 2)));
    }

    #[tokio::test]
    async fn test_reconcile_drops_completed() {
        let (service, _, _, _rx) = service().await;
        service.start("t1").await;
        let removed = service
            .reconcile(&[Task::new("t1", "x").with_status(TaskStatus::Completed)])
            .await;
        assert_eq!(removed, vec!["t1".to_string()]);
        assert!(!service.is_ticking().await);
    }
}

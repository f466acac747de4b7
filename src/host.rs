//! Interactive host: wires the timer service, reminder scheduler and
//! auto-scheduler to a task store and drives them from stdin.
//!
//! One command per line. Core events are printed as they arrive; a
//! `RefreshRequested` event reloads the task list and re-arms reminders.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use taskpulse_core::TaskPulseConfig;
use taskpulse_core::config::SnapshotBackend;
use taskpulse_core::events::{CoreEvent, EventBus, FlagKind, NoticeLevel};
use taskpulse_core::task::Task;
use taskpulse_core::time::{format_elapsed, format_local};
use taskpulse_core::traits::{SnapshotStore, TaskStore};
use taskpulse_scheduler::{
    AutoScheduler, LogSink, NotifyRouter, ReminderRules, ReminderScheduler, ScheduleHistory, SlotRules, WebhookSink,
};
use taskpulse_store::MemoryTaskStore;
use taskpulse_timer::{JsonSnapshotStore, MemorySnapshotStore, SqliteSnapshotStore, StartOutcome, TimerService};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands: list | start ID | pause ID | resume ID | stop ID | schedule ID | yes ID | refresh | status | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// In-memory store, optionally seeded from a JSON task list file.
pub fn offline_store(seed: Option<&Path>) -> Result<MemoryTaskStore> {
    let Some(path) = seed else {
        return Ok(MemoryTaskStore::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let tasks: Vec<Task> = serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!("📋 Offline store seeded with {} task(s)", tasks.len());
    Ok(MemoryTaskStore::new(tasks))
}

fn snapshot_store(config: &TaskPulseConfig, offline: bool) -> Result<Box<dyn SnapshotStore>> {
    if offline {
        return Ok(Box::new(MemorySnapshotStore::new()));
    }
    let path = config.timer.resolved_snapshot_path();
    let store: Box<dyn SnapshotStore> = match config.timer.backend {
        SnapshotBackend::Json => Box::new(JsonSnapshotStore::new(&path)),
        SnapshotBackend::Sqlite => Box::new(SqliteSnapshotStore::open(&path)?),
    };
    tracing::info!("💾 Timer snapshots: {}", path.display());
    Ok(store)
}

fn notify_router(config: &TaskPulseConfig) -> NotifyRouter {
    let mut router = NotifyRouter::new();
    router.register(Arc::new(LogSink));
    if let Some(webhook) = WebhookSink::from_config(&config.notify) {
        router.register(Arc::new(webhook));
    }
    router
}

struct Host {
    store: Arc<dyn TaskStore>,
    timers: TimerService,
    reminders: ReminderScheduler,
    auto: AutoScheduler,
    tasks: Vec<Task>,
}

impl Host {
    async fn new(config: &TaskPulseConfig, store: Arc<dyn TaskStore>, events: EventBus, offline: bool) -> Result<Self> {
        let timers = TimerService::restore(
            snapshot_store(config, offline)?,
            store.clone(),
            events.clone(),
            &config.timer,
        )
        .await;
        let reminders = ReminderScheduler::new(
            ReminderRules::from(&config.reminders),
            Arc::new(notify_router(config)),
            events,
        );
        let auto = if offline {
            let history = ScheduleHistory::new(config.scheduler.history_limit);
            AutoScheduler::new(store.clone(), config.work_window, SlotRules::from(&config.scheduler), history)
        } else {
            AutoScheduler::from_config(store.clone(), config.work_window, &config.scheduler)
        };
        Ok(Self {
            store,
            timers,
            reminders,
            auto,
            tasks: Vec::new(),
        })
    }

    /// Reload the task list, drop timers for completed tasks and re-arm
    /// reminders. A failed reload keeps the previous list.
    async fn refresh(&mut self) {
        match self.store.list().await {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => tracing::warn!("⚠️ Task list refresh failed: {e}"),
        }
        let removed = self.timers.reconcile(&self.tasks).await;
        if !removed.is_empty() {
            tracing::info!("🧹 Dropped timers for completed tasks: {}", removed.join(", "));
        }
        self.reminders.refresh(&self.tasks, Local::now().naive_local());
    }

    fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    async fn handle(&mut self, line: &str) -> Flow {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Flow::Continue;
        };
        let arg = parts.next();

        match (command, arg) {
            ("quit" | "exit", _) => return Flow::Quit,
            ("help", _) => println!("{HELP}"),
            ("list", _) => self.print_tasks().await,
            ("status", _) => self.print_status().await,
            ("refresh", _) => {
                self.refresh().await;
                println!("🔄 {} task(s) loaded", self.tasks.len());
            }
            ("start" | "yes", Some(id)) => {
                if self.task(id).is_none() {
                    println!("❓ Unknown task: {id}");
                } else if self.timers.start(id).await == StartOutcome::AlreadyRunning {
                    println!("⏱️ {id} is already running");
                }
            }
            ("pause", Some(id)) => {
                if !self.timers.pause(id).await {
                    println!("❓ No running timer for {id}");
                }
            }
            ("resume", Some(id)) => {
                if !self.timers.resume(id).await {
                    println!("❓ No paused timer for {id}");
                }
            }
            ("stop", Some(id)) => match self.timers.stop(id).await {
                Some(report) => println!(
                    "✅ {id} stopped after {} ({} min)",
                    format_elapsed(report.elapsed_seconds),
                    report.actual_minutes
                ),
                None => println!("❓ No timer for {id}"),
            },
            ("schedule", Some(id)) => match self.task(id).cloned() {
                Some(task) => match self.auto.apply(&task, Local::now().naive_local()).await {
                    Ok(slot) => {
                        println!(
                            "📅 {} scheduled {} → {}",
                            task.title,
                            slot.start.format("%a %H:%M"),
                            slot.end.format("%H:%M")
                        );
                        self.refresh().await;
                    }
                    Err(e) => println!("❌ Could not save schedule for {id}: {e}"),
                },
                None => println!("❓ Unknown task: {id}"),
            },
            _ => println!("{HELP}"),
        }
        Flow::Continue
    }

    async fn print_tasks(&self) {
        if self.tasks.is_empty() {
            println!("(no tasks)");
            return;
        }
        for task in &self.tasks {
            let planned = task
                .scheduled_start
                .map(format_local)
                .unwrap_or_else(|| "unscheduled".into());
            let timer = match self.timers.elapsed(&task.id).await {
                Some((status, seconds)) => format!("  ⏱️ {} {status}", format_elapsed(seconds)),
                None => String::new(),
            };
            println!(
                "{:<12} {:<12} {:<20} {}{timer}",
                task.id, task.status, planned, task.title
            );
        }
    }

    async fn print_status(&self) {
        let snapshot = self.timers.snapshot().await;
        if snapshot.is_empty() {
            println!("⏱️ no timers");
        }
        for (task_id, timer) in &snapshot.0 {
            println!("⏱️ {task_id}: {} ({})", format_elapsed(timer.elapsed_seconds), timer.status);
        }
        for (task_id, kind, at) in self.reminders.pending() {
            println!("⏰ {task_id}: {kind:?} at {}", at.format("%a %H:%M"));
        }
    }

    async fn shutdown(&mut self) {
        self.reminders.cancel_all();
        self.timers.shutdown().await;
    }
}

/// Render an event for the terminal. Ticks are too frequent to print.
fn describe(event: &CoreEvent) -> Option<String> {
    match event {
        CoreEvent::TimerTick { .. } | CoreEvent::RefreshRequested => None,
        CoreEvent::TimerChanged {
            task_id,
            status: Some(status),
            elapsed_seconds,
        } => Some(format!("⏱️ {task_id}: {status} at {}", format_elapsed(*elapsed_seconds))),
        CoreEvent::TimerChanged { task_id, status: None, .. } => Some(format!("⏹️ {task_id}: timer cleared")),
        CoreEvent::Flag { task_id, flag } => Some(match flag {
            FlagKind::Imminent => format!("🟡 {task_id} starts soon"),
            FlagKind::ShouldStart => format!("🔴 {task_id} should be started"),
        }),
        CoreEvent::FlagCleared { .. } => None,
        CoreEvent::StartRequested { task_id, title } => {
            Some(format!("❔ Start \"{title}\" now? Type `yes {task_id}`"))
        }
        CoreEvent::Notice { level, message } => {
            let icon = match level {
                NoticeLevel::Info => "ℹ️",
                NoticeLevel::Success => "✅",
                NoticeLevel::Warning => "⚠️",
                NoticeLevel::Error => "❌",
            };
            Some(format!("{icon} {message}"))
        }
    }
}

/// Prints events, showing each task flag once until it is cleared or the
/// task's timer changes. Reminder refreshes re-apply flags every minute.
#[derive(Default)]
struct EventPrinter {
    shown_flags: HashSet<(String, FlagKind)>,
}

impl EventPrinter {
    fn render(&mut self, event: &CoreEvent) -> Option<String> {
        match event {
            CoreEvent::Flag { task_id, flag } => {
                if !self.shown_flags.insert((task_id.clone(), *flag)) {
                    return None;
                }
            }
            CoreEvent::FlagCleared { task_id, flag } => {
                self.shown_flags.remove(&(task_id.clone(), *flag));
            }
            CoreEvent::TimerChanged { task_id, .. } => {
                self.shown_flags.retain(|(id, _)| id != task_id);
            }
            _ => {}
        }
        describe(event)
    }
}

pub async fn run(config: TaskPulseConfig, store: Arc<dyn TaskStore>, offline: bool) -> Result<()> {
    let (events, mut rx) = EventBus::channel();
    let mut host = Host::new(&config, store, events, offline).await?;
    host.refresh().await;
    println!("⏱️ TaskPulse ready, {} task(s). {HELP}", host.tasks.len());

    let mut printer = EventPrinter::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh = tokio::time::interval(Duration::from_secs(config.reminders.refresh_interval_secs.max(1)));
    // The first tick is immediate; the initial refresh already ran.
    refresh.tick().await;

    loop {
        tokio::select! {
            _ = refresh.tick() => host.refresh().await,
            Some(event) = rx.recv() => {
                if let Some(text) = printer.render(&event) {
                    println!("{text}");
                }
                if event == CoreEvent::RefreshRequested {
                    host.refresh().await;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if host.handle(line.trim()).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("⚠️ stdin closed: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    host.shutdown().await;
    println!("👋 Timers saved. Bye.");
    Ok(())
}

//! Reminder scheduler: one-shot alarms for planned task starts.
//!
//! Every `refresh` throws away all pending alarms and rebuilds them from the
//! task list it is given, so calling it repeatedly with the same tasks is
//! harmless. For each open task with a planned start `Δ` away:
//!
//! | Δ                         | now                  | later                          |
//! |---------------------------|----------------------|--------------------------------|
//! | more than the pre-start   | -                    | imminent flag at start − lead  |
//! | 0 < Δ ≤ pre-start         | imminent flag        | on-time alert at start         |
//! | past grace, inside window | should-start flag    | -                              |
//!
//! Everything with Δ > 0 also gets the on-time alert: a system notification,
//! the should-start flag, a warning toast and a start confirmation request.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use taskpulse_core::config::ReminderConfig;
use taskpulse_core::events::{CoreEvent, EventBus, FlagKind, NoticeLevel};
use taskpulse_core::task::Task;
use tokio::task::JoinHandle;

use crate::notify::NotifyRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRules {
    pub pre_start: Duration,
    pub overdue_grace: Duration,
    pub overdue_window: Duration,
    /// Toast on every refresh while overdue, not just the first.
    pub repeat_overdue_notice: bool,
}

impl Default for ReminderRules {
    fn default() -> Self {
        Self::from(&ReminderConfig::default())
    }
}

impl From<&ReminderConfig> for ReminderRules {
    fn from(config: &ReminderConfig) -> Self {
        Self {
            pre_start: config_minutes(config.pre_start_minutes),
            overdue_grace: config_minutes(config.overdue_grace_minutes),
            overdue_window: config_minutes(config.overdue_window_minutes),
            repeat_overdue_notice: config.repeat_overdue_notice,
        }
    }
}

/// Configured offsets are kept between zero and a week.
fn config_minutes(minutes: i64) -> Duration {
    Duration::minutes(minutes.clamp(0, 7 * 24 * 60))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReminderKind {
    PreStartFlash,
    OnTimeAlert,
}

struct PendingReminder {
    fire_at: NaiveDateTime,
    handle: JoinHandle<()>,
}

/// What a refresh did, for the host's status line and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub scheduled: usize,
    pub imminent: Vec<String>,
    pub overdue: Vec<String>,
}

pub struct ReminderScheduler {
    rules: ReminderRules,
    router: Arc<NotifyRouter>,
    events: EventBus,
    pending: BTreeMap<(String, ReminderKind), PendingReminder>,
    /// Tasks already toasted as overdue in the current overdue stretch.
    warned_overdue: HashSet<String>,
}

impl ReminderScheduler {
    pub fn new(rules: ReminderRules, router: Arc<NotifyRouter>, events: EventBus) -> Self {
        Self {
            rules,
            router,
            events,
            pending: BTreeMap::new(),
            warned_overdue: HashSet::new(),
        }
    }

    /// Cancel every pending alarm and rebuild from `tasks`.
    /// Must be called from inside a tokio runtime.
    pub fn refresh(&mut self, tasks: &[Task], now: NaiveDateTime) -> RefreshSummary {
        self.cancel_all();
        let mut summary = RefreshSummary::default();
        let mut overdue_now = HashSet::new();

        for task in tasks.iter().filter(|t| t.is_open()) {
            let Some(start) = task.scheduled_start else {
                continue;
            };
            let delta = start - now;

            if delta > self.rules.pre_start {
                self.arm(task, ReminderKind::PreStartFlash, start - self.rules.pre_start, now);
            } else if delta > Duration::zero() {
                self.flag(&task.id, FlagKind::Imminent);
                summary.imminent.push(task.id.clone());
            }

            if delta > Duration::zero() {
                self.arm(task, ReminderKind::OnTimeAlert, start, now);
            } else if delta < -self.rules.overdue_grace && delta > -self.rules.overdue_window {
                self.flag(&task.id, FlagKind::ShouldStart);
                if self.rules.repeat_overdue_notice || !self.warned_overdue.contains(&task.id) {
                    self.events.notice(
                        NoticeLevel::Warning,
                        format!(
                            "Task \"{}\" should have started {} minutes ago",
                            task.title,
                            (-delta).num_minutes()
                        ),
                    );
                }
                overdue_now.insert(task.id.clone());
                summary.overdue.push(task.id.clone());
            }
        }

        self.warned_overdue = overdue_now;
        summary.scheduled = self.pending.len();
        tracing::debug!(
            "⏰ Reminders refreshed: {} armed, {} imminent, {} overdue",
            summary.scheduled,
            summary.imminent.len(),
            summary.overdue.len()
        );
        summary
    }

    /// Alarms that have not fired yet, ordered by task id then kind.
    pub fn pending(&self) -> Vec<(String, ReminderKind, NaiveDateTime)> {
        self.pending
            .iter()
            .filter(|(_, p)| !p.handle.is_finished())
            .map(|((id, kind), p)| (id.clone(), *kind, p.fire_at))
            .collect()
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in std::mem::take(&mut self.pending) {
            pending.handle.abort();
        }
    }

    fn flag(&self, task_id: &str, flag: FlagKind) {
        self.events.emit(CoreEvent::Flag {
            task_id: task_id.to_string(),
            flag,
        });
    }

    fn arm(&mut self, task: &Task, kind: ReminderKind, fire_at: NaiveDateTime, now: NaiveDateTime) {
        let delay = (fire_at - now).to_std().unwrap_or_default();
        let task_id = task.id.clone();
        let title = task.title.clone();
        let router = self.router.clone();
        let events = self.events.clone();
        let lead_minutes = self.rules.pre_start.num_minutes();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match kind {
                ReminderKind::PreStartFlash => {
                    events.emit(CoreEvent::Flag {
                        task_id,
                        flag: FlagKind::Imminent,
                    });
                    events.notice(
                        NoticeLevel::Info,
                        format!("Task \"{title}\" starts in {lead_minutes} minutes"),
                    );
                }
                ReminderKind::OnTimeAlert => {
                    tracing::info!("🔔 Task '{title}' is due to start");
                    router
                        .notify("Task reminder", &format!("Time to start \"{title}\""), &task_id)
                        .await;
                    events.emit(CoreEvent::FlagCleared {
                        task_id: task_id.clone(),
                        flag: FlagKind::Imminent,
                    });
                    events.emit(CoreEvent::Flag {
                        task_id: task_id.clone(),
                        flag: FlagKind::ShouldStart,
                    });
                    events.notice(NoticeLevel::Warning, format!("It's time to start \"{title}\""));
                    events.emit(CoreEvent::StartRequested { task_id, title });
                }
            }
        });

        self.pending
            .insert((task.id.clone(), kind), PendingReminder { fire_at, handle });
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

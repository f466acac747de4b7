//! # TaskPulse Scheduler
//!
//! Two independent halves:
//! - **Auto-scheduling**: pick the earliest free slot for a task inside the
//!   working day, avoiding lunch and every other planned task.
//! - **Reminders**: watch planned starts and flag, toast and notify as they
//!   approach and pass.
//!
//! Notifications fan out through [`NotifyRouter`] to any number of sinks
//! (tracing log, generic webhook).

pub mod auto;
pub mod dispatch;
pub mod history;
pub mod notify;
pub mod reminders;
pub mod slot;

pub use auto::AutoScheduler;
pub use dispatch::WebhookSink;
pub use history::{HistoryEntry, ScheduleHistory};
pub use notify::{LogSink, Notification, NotifyRouter};
pub use reminders::{RefreshSummary, ReminderKind, ReminderRules, ReminderScheduler};
pub use slot::{OccupiedInterval, ScheduleRequest, Slot, SlotRules, compute_slot, fallback_slot};

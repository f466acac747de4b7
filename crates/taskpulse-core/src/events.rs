//! Core events: what the UI collaborator receives instead of DOM updates.
//!
//! The core never renders. Every state change is reported as a `CoreEvent`
//! on an unbounded channel; whoever holds the receiver decides how to show it.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::snapshot::TimerStatus;

/// Visual flags the reminder scheduler puts on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Start is less than the pre-start lead away.
    Imminent,
    /// Planned start has passed; the user should start the task.
    ShouldStart,
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    /// Emitted once per tick for every timed task.
    TimerTick {
        task_id: String,
        elapsed_seconds: u64,
        status: TimerStatus,
    },
    /// A command changed a timer. `status: None` means the record is gone.
    TimerChanged {
        task_id: String,
        status: Option<TimerStatus>,
        elapsed_seconds: u64,
    },
    Flag {
        task_id: String,
        flag: FlagKind,
    },
    FlagCleared {
        task_id: String,
        flag: FlagKind,
    },
    /// Ask the user whether to start the task's timer now.
    StartRequested {
        task_id: String,
        title: String,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
    /// The task list changed remotely; reload it.
    RefreshRequested,
}

/// Sending half of the event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl EventBus {
    /// Create a bus and the receiver the UI side drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. A dropped receiver is not an error for the core.
    pub fn emit(&self, event: CoreEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(CoreEvent::Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_receive() {
        let (bus, mut rx) = EventBus::channel();
        bus.notice(NoticeLevel::Info, "hello");
        bus.emit(CoreEvent::RefreshRequested);
        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Notice {
                level: NoticeLevel::Info,
                message: "hello".into()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), CoreEvent::RefreshRequested);
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (bus, rx) = EventBus::channel();
        drop(rx);
        bus.emit(CoreEvent::RefreshRequested);
    }

    #[test]
    fn test_event_json_shape() {
        let event = CoreEvent::Flag {
            task_id: "t-1".into(),
            flag: FlagKind::ShouldStart,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "flag");
        assert_eq!(json["flag"], "should_start");
    }
}

//! # TaskPulse Core
//!
//! Shared vocabulary for the TaskPulse crates: the task model as the task
//! store sees it, configuration, the error taxonomy, the collaborator traits
//! the timer and scheduler components talk through, and the event bus that
//! replaces the UI refresh callback.
//!
//! ```text
//! TaskStore ──list()──▶ [Task] ──▶ AutoScheduler / ReminderScheduler
//!     ▲                                   │
//!     └──patch()── TimerService ◀── user commands
//!                       │
//!                       └──▶ EventBus ──▶ UI collaborator
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod snapshot;
pub mod task;
pub mod time;
pub mod traits;

pub use config::TaskPulseConfig;
pub use error::{Result, TaskPulseError};
pub use events::{CoreEvent, EventBus, FlagKind, NoticeLevel};
pub use task::{Task, TaskPatch, TaskStatus};
pub use snapshot::{PersistedTimer, TimerSnapshot, TimerStatus};
pub use traits::{NotificationSink, SnapshotStore, TaskStore};

//! # TaskPulse Timer
//!
//! Tracks how long each task has actually been worked on.
//!
//! - One `TimerRecord` per timed task, owned by the `TimerRegistry`
//! - One shared 1 Hz tick for the whole process, running only while some
//!   timer is active
//! - Every command persists the registry (JSON file or SQLite); a failed save
//!   never blocks the transition
//!
//! ```text
//! None ──start──▶ Active ──pause──▶ Paused
//!                   ▲  ◀──resume──────┘
//!                   └──stop (from either)──▶ removed + completion report
//! ```

pub mod clock;
pub mod persistence;
pub mod registry;
pub mod service;
pub mod store;

pub use clock::TickSource;
pub use persistence::SqliteSnapshotStore;
pub use registry::{CompletionReport, StartOutcome, TimerReading, TimerRecord, TimerRegistry, TransitionError};
pub use service::TimerService;
pub use store::{JsonSnapshotStore, MemorySnapshotStore};

//! # TaskPulse Store
//!
//! [`TaskStore`](taskpulse_core::TaskStore) implementations: the REST backend
//! the web client talks to, and an in-memory store for offline sessions and
//! tests.

pub mod memory;
pub mod rest;

pub use memory::MemoryTaskStore;
pub use rest::RestTaskStore;

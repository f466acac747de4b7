//! Error types shared across TaskPulse crates.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum TaskPulseError {
    /// Configuration could not be read, parsed or validated.
    #[error("config error: {0}")]
    Config(String),

    /// The task store collaborator failed (network, HTTP status, decoding).
    #[error("task store error: {0}")]
    Store(String),

    /// The durable local store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A notification sink refused or failed to deliver.
    #[error("notification error: {0}")]
    Notify(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskPulseError>;

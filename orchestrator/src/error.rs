//! Error types for the workflow engine

use crate::state::ThreadStatus;

/// Errors surfaced to callers of [`crate::WorkflowEngine`]
///
/// Agent failures are not here: they are recorded in the thread's state and
/// force a halt instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Thread not found: {0}")]
    NotFound(String),

    #[error("Thread {thread_id} cannot accept this request while {status}")]
    InvalidState {
        thread_id: String,
        status: ThreadStatus,
    },

    #[error("Thread {0} already has an active runner")]
    ConcurrencyConflict(String),

    #[error("Checkpoint store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from a checkpoint store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "persistence")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint store unavailable: {0}")]
    Unavailable(String),
}

//! Error types for worker supervision and the job loop

use thiserror::Error;

/// Errors from spawning, feeding, or tearing down worker processes
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The worker binary could not be started
    #[error("Failed to spawn worker `{0}`: {1}")]
    Spawn(String, String),

    /// The worker process is not running (crashed or already shut down)
    #[error("Worker on device `{0}` is not running")]
    WorkerGone(String),

    /// A wire message could not be encoded or decoded
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Pipe I/O failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the knowledge engine.
///
/// Foreground calls (`learn`, `save`, `load`) return these to the caller.
/// The maintenance loop logs them and keeps ticking.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Score outside [0, 1] (or NaN). The insert is rejected.
    #[error("confidence {0} is outside [0.0, 1.0]")]
    InvalidConfidence(f64),

    /// No persisted state at the expected location. Callers start empty.
    #[error("no persisted state at {}", .0.display())]
    NotFound(PathBuf),

    /// Persisted state failed to parse or validate.
    #[error("persisted state is corrupt: {0}")]
    CorruptState(String),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl KnowledgeError {
    /// NotFound is the only error that means "start empty".
    pub fn is_not_found(&self) -> bool {
        matches!(self, KnowledgeError::NotFound(_))
    }
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

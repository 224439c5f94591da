//! Executor errors

use thiserror::Error;

/// Result alias for executor operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Errors surfaced by the executor pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
    /// An underlying MVCC read failed (including per-key lock errors,
    /// which the coprocessor layer relays to the client for resolution).
    #[error(transparent)]
    Mvcc(#[from] basalt_core::Error),

    /// Malformed row, index or datum bytes.
    #[error("codec error: {0}")]
    Codec(String),

    /// An expression could not be evaluated over the row.
    #[error("eval error: {0}")]
    Eval(String),
}

impl ExecError {
    /// Create a codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        ExecError::Codec(msg.into())
    }

    /// Create an evaluation error.
    pub fn eval(msg: impl Into<String>) -> Self {
        ExecError::Eval(msg.into())
    }
}

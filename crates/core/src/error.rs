//! Error types for Basalt
//!
//! One unified error enum covers the whole engine. Variants fall into two
//! classes:
//!
//! - **Per-key** errors (`KeyIsLocked`, `WriteConflict`, `Aborted`,
//!   `AlreadyCommitted`, `LockNotFound`, `Replaced`) are recoverable at the
//!   client: it resolves the offending lock or retries with a fresh
//!   timestamp.
//! - **Region** errors (`Codec`, `Store`, `Cancelled`, `Retryable`) describe
//!   the request as a whole and map to the region-error field of a response.

use crate::ts::Ts;
use thiserror::Error;

/// Result type alias for Basalt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The key is locked by another transaction. The client should resolve
    /// the lock (or wait out its TTL) and retry.
    #[error("key {key:?} is locked by txn {start_ts} (primary {primary:?}, ttl {ttl_ms}ms)")]
    KeyIsLocked {
        /// The locked key.
        key: Vec<u8>,
        /// Primary key of the locking transaction.
        primary: Vec<u8>,
        /// `start_ts` of the locking transaction.
        start_ts: Ts,
        /// Lock TTL in milliseconds.
        ttl_ms: u64,
    },

    /// A newer committed version exists; the prewrite must restart with a
    /// fresh `start_ts`.
    #[error("write conflict: txn {start_ts} overlaps commit at {conflict_commit_ts}")]
    WriteConflict {
        /// `start_ts` of the conflicting transaction.
        start_ts: Ts,
        /// `commit_ts` of the already-committed write.
        conflict_commit_ts: Ts,
    },

    /// The transaction can never commit (e.g. it was already rolled back).
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// Rollback arrived after the transaction committed.
    #[error("already committed at {commit_ts}")]
    AlreadyCommitted {
        /// The commit timestamp of the successful commit.
        commit_ts: Ts,
    },

    /// Commit found neither a matching lock nor a committed trace.
    #[error("lock not found")]
    LockNotFound,

    /// Commit found the key locked by a different transaction.
    #[error("lock replaced by another transaction")]
    Replaced,

    /// Transient failure; safe to retry the whole request.
    #[error("retryable: {0}")]
    Retryable(String),

    /// A stored record failed to decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// The caller cancelled the operation while it was blocked.
    #[error("operation cancelled")]
    Cancelled,

    /// The backing store reported a failure.
    #[error("backing store error: {0}")]
    Store(String),
}

impl Error {
    /// Create a codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Create a backing-store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Create an aborted error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Error::Aborted(reason.into())
    }

    /// True for errors returned per key and recoverable at the client.
    pub fn is_per_key(&self) -> bool {
        matches!(
            self,
            Error::KeyIsLocked { .. }
                | Error::WriteConflict { .. }
                | Error::Aborted(_)
                | Error::AlreadyCommitted { .. }
                | Error::LockNotFound
                | Error::Replaced
        )
    }

    /// True when the client may retry after lock resolution or with a new
    /// timestamp.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::KeyIsLocked { .. } | Error::WriteConflict { .. } | Error::Retryable(_)
        )
    }

    /// True for failures that map to the region-error response field.
    pub fn is_region_error(&self) -> bool {
        matches!(
            self,
            Error::Codec(_) | Error::Store(_) | Error::Cancelled | Error::Retryable(_)
        )
    }
}

//! Per-operation cancellation context
//!
//! Every engine operation takes an [`OpContext`]. Blocking waits (latch
//! acquisition, write-worker acknowledgement) poll it and bail out with
//! [`Error::Cancelled`](crate::error::Error::Cancelled) without mutating
//! state. Writes already handed to the worker are not undone.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-supplied context threaded through one operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancelled: Arc<AtomicBool>,
}

impl OpContext {
    /// A fresh, non-cancelled context.
    pub fn new() -> Self {
        OpContext::default()
    }

    /// Handle the caller keeps to cancel this operation from another
    /// thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// True once the caller has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Error out if cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels the paired [`OpContext`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

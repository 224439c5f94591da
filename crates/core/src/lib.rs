//! Core types for Basalt
//!
//! This crate holds everything the other layers agree on:
//! - Timestamps and the version-key codec
//! - The mixed record (lock + latest value) and its binary form
//! - The unified error type
//! - The backing-store contract (`Store`, `StoreView`, `StoreIter`)
//! - `WriteBatch` staging and the cancellation context
//!
//! Nothing here does I/O. The backing store lives in `basalt-storage`,
//! the transaction engine in `basalt-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod codec;
pub mod context;
pub mod error;
pub mod record;
pub mod traits;
pub mod ts;

pub use batch::{BatchEntry, WriteBatch};
pub use context::{CancelHandle, OpContext};
pub use error::{Error, Result};
pub use record::{Lock, LockOp, Mixed, ValueKind, ValueRecord, OLD_META};
pub use traits::{Entry, KvPair, SnapshotSource, Store, StoreIter, StoreView};
pub use ts::{compose_ts, physical, Ts, LOCK_VER};

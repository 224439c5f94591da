//! Region-scoped concurrency control
//!
//! A region owns a contiguous `[start_key, end_key)` slice of the
//! keyspace. This crate provides the per-region machinery the engine
//! serialises writes with:
//!
//! - [`Latches`]: a fixed table of hashed key latches with FIFO waiter
//!   queues and batch-atomic acquisition (sorted hashes, release-on-
//!   collision), which prevents deadlock between concurrent multi-key
//!   transactions.
//! - [`TxnIndex`]: `start_ts → prewritten key set`, consulted by commit,
//!   rollback, lock scanning and lock resolution so they never rescan the
//!   backing store.
//! - [`RegionContext`]: the owning object, plus the approximate size-diff
//!   accumulator commits report into.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod latches;
mod region;
mod txn_index;

pub use latches::{hash_key, Latches};
pub use region::RegionContext;
pub use txn_index::TxnIndex;

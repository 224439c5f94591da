//! The Basalt transaction engine
//!
//! This crate layers percolator-style transactions over the ordered
//! backing store:
//!
//! - [`WriteWorker`]: a single background writer that serialises durable
//!   batch writes; every write operation blocks on its acknowledgement.
//! - [`TxnEngine`]: the MVCC operation set: Get, BatchGet, Scan,
//!   ReverseScan, Prewrite, Commit, Rollback, Cleanup, ScanLock,
//!   ResolveLock, DeleteRange and GC.
//! - [`MvccSnapshot`]: a pinned read view implementing
//!   [`SnapshotSource`](basalt_core::traits::SnapshotSource) for the
//!   executor pipeline.
//!
//! Every write follows the same skeleton: hash the keys, latch them in
//! the region, open a read view, stage a write batch, hand the batch to
//! the worker, release the latches, then await the acknowledgement.
//! Reads never latch and never block on locks; a conflicting lock comes
//! back as a per-key error for the client to resolve.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod mvcc;
mod writer;

pub use mvcc::{LockInfo, Mutation, MutationOp, MvccSnapshot, TxnEngine};
pub use writer::{AckHandle, WriteWorker};

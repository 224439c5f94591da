//! In-memory ordered backing store
//!
//! [`MemStore`] is the reference implementation of the backing-store
//! contract in `basalt-core::traits`. It keeps the whole keyspace in an
//! `Arc<BTreeMap>` and copy-on-writes per batch, so opening a read view
//! is O(1) and the view is immutable for its whole lifetime, which is the
//! snapshot property the MVCC layer builds on.
//!
//! Durability, compaction and the rest of a persistent store's internals
//! are deliberately absent; the engine only relies on the contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod mem;

pub use mem::{MemStore, MemView};

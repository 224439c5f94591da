//! Backing-store contract and the snapshot read surface
//!
//! The engine is written against these traits so the ordered store can be
//! swapped (in-memory reference store, LSM, remote shard) without touching
//! the transaction layer.
//!
//! Contract highlights:
//! - the keyspace is a single lexicographically ordered namespace;
//! - `write` applies a whole [`WriteBatch`] atomically;
//! - a [`StoreView`] is an immutable point-in-time view; concurrent
//!   writers never shift visibility inside one view;
//! - every record carries a store-assigned `version` (for optimistic
//!   deletes) and a one-byte `user_meta` (flag mirror, see
//!   [`crate::record`]).

use crate::batch::WriteBatch;
use crate::context::OpContext;
use crate::error::Result;
use crate::ts::Ts;

/// A stored record as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Raw record bytes.
    pub value: Vec<u8>,
    /// Meta byte written with the record.
    pub user_meta: u8,
    /// Store-assigned version, bumped on every write of the key.
    pub version: u64,
}

/// A user key paired with its visible value.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// The ordered backing store.
pub trait Store: Send + Sync {
    /// Open an immutable read view of the current state.
    fn view(&self) -> Box<dyn StoreView>;

    /// Apply `batch` atomically. Blocks until durable.
    fn write(&self, batch: WriteBatch) -> Result<()>;
}

/// An immutable point-in-time view of the store.
pub trait StoreView: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Result<Option<Entry>>;

    /// Bidirectional iterator over the view.
    fn iter(&self) -> Box<dyn StoreIter + '_>;
}

/// Cursor over an ordered view.
///
/// All positioning methods return whether the cursor is valid afterwards;
/// `key`/`entry` must only be called while valid.
pub trait StoreIter {
    /// Position at the first key `>= target`.
    fn seek(&mut self, target: &[u8]) -> bool;

    /// Position at the last key `<= target`.
    fn seek_for_prev(&mut self, target: &[u8]) -> bool;

    /// Position at the last key in the view.
    fn seek_to_last(&mut self) -> bool;

    /// Advance to the next key.
    fn next(&mut self) -> bool;

    /// Step back to the previous key.
    fn prev(&mut self) -> bool;

    /// True while positioned on a record.
    fn valid(&self) -> bool;

    /// Current key.
    fn key(&self) -> &[u8];

    /// Current record.
    fn entry(&self) -> &Entry;
}

/// Snapshot-consistent MVCC reads, as consumed by the executor pipeline.
///
/// Implemented by the engine's snapshot adapter. All methods honour the
/// lock-visibility rule: a conflicting lock surfaces as
/// [`Error::KeyIsLocked`](crate::error::Error::KeyIsLocked) rather than
/// blocking.
pub trait SnapshotSource: Send + Sync {
    /// Point lookup at `ts`.
    fn get(&self, ctx: &OpContext, key: &[u8], ts: Ts) -> Result<Option<Vec<u8>>>;

    /// Ascending scan of `[start, end)` visible at `ts`, at most `limit`
    /// pairs. An empty `end` means unbounded.
    fn scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        ts: Ts,
    ) -> Result<Vec<KvPair>>;

    /// Descending scan of `[start, end)` visible at `ts`.
    fn reverse_scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        ts: Ts,
    ) -> Result<Vec<KvPair>>;
}

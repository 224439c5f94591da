//! Region context

use crate::latches::Latches;
use crate::txn_index::TxnIndex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Default number of latch slots per region.
const DEFAULT_LATCH_SLOTS: usize = 256;

/// Per-region shared state: key range, latch table, transaction index and
/// the approximate size-diff accumulator.
pub struct RegionContext {
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    /// The region's latch table.
    pub latches: Latches,
    /// The region's transaction index.
    pub txn_index: TxnIndex,
    size_diff: AtomicI64,
}

impl RegionContext {
    /// Create a region owning `[start_key, end_key)`. An empty `end_key`
    /// means unbounded.
    pub fn new(start_key: Vec<u8>, end_key: Vec<u8>) -> Self {
        Self::with_latches(start_key, end_key, DEFAULT_LATCH_SLOTS)
    }

    /// Create a region with a custom latch table size.
    pub fn with_latches(start_key: Vec<u8>, end_key: Vec<u8>, latch_slots: usize) -> Self {
        RegionContext {
            start_key,
            end_key,
            latches: Latches::new(latch_slots),
            txn_index: TxnIndex::new(),
            size_diff: AtomicI64::new(0),
        }
    }

    /// Inclusive lower bound of the region.
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    /// Exclusive upper bound; empty means unbounded.
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    /// True when `key` falls inside the region.
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// Accumulate an approximate on-disk size change.
    pub fn record_size_diff(&self, delta: i64) {
        self.size_diff.fetch_add(delta, Ordering::Relaxed);
    }

    /// Net approximate size change since creation.
    pub fn size_diff(&self) -> i64 {
        self.size_diff.load(Ordering::Relaxed)
    }
}

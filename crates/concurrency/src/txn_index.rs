//! Per-transaction key index
//!
//! Maps a transaction's `start_ts` to the set of user keys it prewrote in
//! this region. Commit and rollback look their keys up here, lock
//! scanning enumerates it, and lock resolution works from it without
//! rescanning the backing store.
//!
//! Readers also plant advisory hints here when they trip over a
//! TTL-expired lock; such entries may name keys the transaction never
//! locked, so consumers always re-validate against the live record.
//! Every entry for a `start_ts` is wiped when that transaction commits,
//! rolls back or is resolved, so speculative hints cannot leak.

use basalt_core::ts::Ts;
use dashmap::DashMap;
use rustc_hash::FxHashSet;

/// Concurrent `start_ts → key set` index.
#[derive(Default)]
pub struct TxnIndex {
    map: DashMap<Ts, FxHashSet<Vec<u8>>>,
}

impl TxnIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        TxnIndex::default()
    }

    /// Record one key under `start_ts`.
    pub fn add_key(&self, start_ts: Ts, key: &[u8]) {
        self.map.entry(start_ts).or_default().insert(key.to_vec());
    }

    /// Record a batch of keys under `start_ts`.
    pub fn add_keys<'a>(&self, start_ts: Ts, keys: impl IntoIterator<Item = &'a [u8]>) {
        let mut entry = self.map.entry(start_ts).or_default();
        for key in keys {
            entry.insert(key.to_vec());
        }
    }

    /// The keys currently recorded for `start_ts`, sorted.
    pub fn keys(&self, start_ts: Ts) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .map
            .get(&start_ts)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Drop every entry for `start_ts`.
    pub fn remove(&self, start_ts: Ts) {
        self.map.remove(&start_ts);
    }

    /// All `(start_ts, keys)` entries with `start_ts < max_ts`, ordered
    /// by timestamp.
    pub fn all_below(&self, max_ts: Ts) -> Vec<(Ts, Vec<Vec<u8>>)> {
        let mut out: Vec<(Ts, Vec<Vec<u8>>)> = self
            .map
            .iter()
            .filter(|e| *e.key() < max_ts)
            .map(|e| {
                let mut keys: Vec<Vec<u8>> = e.value().iter().cloned().collect();
                keys.sort_unstable();
                (*e.key(), keys)
            })
            .collect();
        out.sort_unstable_by_key(|(ts, _)| *ts);
        out
    }

    /// Number of transactions currently indexed.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no transaction is indexed.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

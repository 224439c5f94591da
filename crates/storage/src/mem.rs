//! Copy-on-write ordered map store

use basalt_core::batch::{BatchEntry, WriteBatch};
use basalt_core::error::Result;
use basalt_core::traits::{Entry, Store, StoreIter, StoreView};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Map = BTreeMap<Vec<u8>, Entry>;

/// Ordered in-memory store with atomic batch writes and O(1) views.
///
/// Writers take the map mutex, copy-on-write the shared `Arc` (the copy
/// is only paid when a view still holds the previous epoch), apply the
/// batch, and publish. Every record written by a batch gets the same
/// freshly allocated store version, which conditional deletes compare
/// against.
pub struct MemStore {
    map: Mutex<Arc<Map>>,
    next_version: AtomicU64,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemStore {
            map: Mutex::new(Arc::new(BTreeMap::new())),
            next_version: AtomicU64::new(0),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        MemStore::new()
    }
}

impl Store for MemStore {
    fn view(&self) -> Box<dyn StoreView> {
        Box::new(MemView {
            map: Arc::clone(&self.map.lock()),
        })
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut guard = self.map.lock();
        let map = Arc::make_mut(&mut *guard);
        for entry in batch.entries() {
            match entry {
                BatchEntry::Put {
                    key,
                    value,
                    user_meta,
                } => {
                    map.insert(
                        key.clone(),
                        Entry {
                            value: value.clone(),
                            user_meta: *user_meta,
                            version,
                        },
                    );
                }
                BatchEntry::Delete {
                    key,
                    expected_version,
                } => match expected_version {
                    None => {
                        map.remove(key);
                    }
                    Some(expected) => {
                        // Skip if a concurrent batch rewrote the record
                        // since the caller observed it.
                        if map.get(key).is_some_and(|e| e.version == *expected) {
                            map.remove(key);
                        }
                    }
                },
            }
        }
        Ok(())
    }
}

/// Immutable view over one store epoch.
pub struct MemView {
    map: Arc<Map>,
}

impl StoreView for MemView {
    fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        Ok(self.map.get(key).cloned())
    }

    fn iter(&self) -> Box<dyn StoreIter + '_> {
        Box::new(MemIter {
            map: &self.map,
            pos: None,
        })
    }
}

struct MemIter<'a> {
    map: &'a Map,
    /// Current position: key plus a clone of its entry.
    pos: Option<(Vec<u8>, Entry)>,
}

impl MemIter<'_> {
    fn set(&mut self, found: Option<(&Vec<u8>, &Entry)>) -> bool {
        self.pos = found.map(|(k, e)| (k.clone(), e.clone()));
        self.pos.is_some()
    }
}

impl StoreIter for MemIter<'_> {
    fn seek(&mut self, target: &[u8]) -> bool {
        let found = self
            .map
            .range::<[u8], _>((Included(target), Unbounded))
            .next();
        self.set(found)
    }

    fn seek_for_prev(&mut self, target: &[u8]) -> bool {
        let found = self
            .map
            .range::<[u8], _>((Unbounded, Included(target)))
            .next_back();
        self.set(found)
    }

    fn seek_to_last(&mut self) -> bool {
        let found = self.map.iter().next_back();
        self.set(found)
    }

    fn next(&mut self) -> bool {
        let found = match &self.pos {
            Some((key, _)) => self
                .map
                .range::<[u8], _>((Excluded(key.as_slice()), Unbounded))
                .next(),
            None => None,
        };
        self.set(found)
    }

    fn prev(&mut self) -> bool {
        let found = match &self.pos {
            Some((key, _)) => self
                .map
                .range::<[u8], _>((Unbounded, Excluded(key.as_slice())))
                .next_back(),
            None => None,
        };
        self.set(found)
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> &[u8] {
        &self.pos.as_ref().expect("iterator not valid").0
    }

    fn entry(&self) -> &Entry {
        &self.pos.as_ref().expect("iterator not valid").1
    }
}

//! Write batch staging
//!
//! Mutations are staged into a [`WriteBatch`] while per-key latches are
//! held, then handed to the write worker which applies the batch through
//! the backing store's atomic batch-write primitive. A batch is atomic;
//! ordering across batches follows submission order only.

/// One staged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntry {
    /// Insert or overwrite a record.
    Put {
        /// Raw store key (latest or old-version namespace).
        key: Vec<u8>,
        /// Encoded record bytes.
        value: Vec<u8>,
        /// Meta byte stored alongside the record.
        user_meta: u8,
    },
    /// Remove a record.
    Delete {
        /// Raw store key.
        key: Vec<u8>,
        /// When set, the delete only applies if the record's store
        /// version still matches (optimistic delete, used by GC).
        expected_version: Option<u64>,
    },
}

impl BatchEntry {
    /// The store key this entry touches.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchEntry::Put { key, .. } => key,
            BatchEntry::Delete { key, .. } => key,
        }
    }
}

/// An ordered set of mutations applied atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<BatchEntry>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        WriteBatch::default()
    }

    /// Stage a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>, user_meta: u8) {
        self.entries.push(BatchEntry::Put {
            key,
            value,
            user_meta,
        });
    }

    /// Stage an unconditional delete.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.entries.push(BatchEntry::Delete {
            key,
            expected_version: None,
        });
    }

    /// Stage a delete that is skipped if the record's store version moved.
    pub fn delete_if_version(&mut self, key: Vec<u8>, expected_version: u64) {
        self.entries.push(BatchEntry::Delete {
            key,
            expected_version: Some(expected_version),
        });
    }

    /// Staged entries in submission order.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate byte footprint, used for the region size-diff counter.
    pub fn approx_size(&self) -> i64 {
        self.entries
            .iter()
            .map(|e| match e {
                BatchEntry::Put { key, value, .. } => (key.len() + value.len()) as i64,
                BatchEntry::Delete { key, .. } => -(key.len() as i64),
            })
            .sum()
    }
}

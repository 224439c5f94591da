//! Index scan leaf

use crate::datum::{decode_datum, Datum};
use crate::error::{ExecError, ExecResult};
use crate::exec::{Executor, KeyRange, Row};
use crate::scan::RangeReader;
use crate::table::{read_comparable_i64, INDEX_KEY_PREFIX_LEN};
use basalt_core::context::OpContext;
use basalt_core::traits::SnapshotSource;
use basalt_core::ts::Ts;
use std::sync::Arc;

/// Scans index entries, decoding the composite key into column datums
/// and recovering the row handle from the value (unique indexes) or the
/// trailing key remainder (non-unique indexes).
pub struct IndexScan {
    reader: RangeReader,
    column_count: usize,
}

impl IndexScan {
    /// Build an index scan over `ranges` at `ts`. `column_count` is the
    /// number of indexed columns encoded in each key; `unique` enables
    /// point lookups for single-key ranges (non-unique entries carry the
    /// handle in the key, so their "exact" ranges still scan).
    pub fn new(
        src: Arc<dyn SnapshotSource>,
        ctx: OpContext,
        ts: Ts,
        column_count: usize,
        unique: bool,
        ranges: Vec<KeyRange>,
        desc: bool,
    ) -> Self {
        let points = ranges.iter().map(|r| unique && r.is_point()).collect();
        IndexScan {
            reader: RangeReader::new(src, ctx, ts, desc, ranges, points),
            column_count,
        }
    }
}

impl Executor for IndexScan {
    fn next(&mut self) -> ExecResult<Option<Row>> {
        let Some((key, value)) = self.reader.next_kv()? else {
            return Ok(None);
        };
        if key.len() < INDEX_KEY_PREFIX_LEN {
            return Err(ExecError::codec("index key shorter than its prefix"));
        }
        let mut cur = &key[INDEX_KEY_PREFIX_LEN..];
        let mut values = Vec::with_capacity(self.column_count);
        for _ in 0..self.column_count {
            values.push(decode_datum(&mut cur)?);
        }
        let handle = if value.len() == 8 {
            read_comparable_i64(&value)?
        } else {
            read_comparable_i64(cur)?
        };
        Ok(Some(Row { handle, values }))
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        self.reader.cursor()
    }

    fn scanned_rows(&self) -> Vec<i64> {
        self.reader.counts()
    }
}

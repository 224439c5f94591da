//! Table scan leaf

use crate::datum::Datum;
use crate::error::ExecResult;
use crate::exec::{Executor, KeyRange, Row};
use crate::row::decode_row;
use crate::scan::RangeReader;
use crate::table::{decode_row_handle, ColumnInfo, ROW_KEY_LEN};
use basalt_core::context::OpContext;
use basalt_core::traits::SnapshotSource;
use basalt_core::ts::Ts;
use std::sync::Arc;

/// Scans record keys and materialises rows into the declared column
/// order, synthesising the handle column and column defaults.
pub struct TableScan {
    reader: RangeReader,
    columns: Vec<ColumnInfo>,
}

impl TableScan {
    /// Build a table scan over `ranges` (in declared order) at `ts`.
    pub fn new(
        src: Arc<dyn SnapshotSource>,
        ctx: OpContext,
        ts: Ts,
        columns: Vec<ColumnInfo>,
        ranges: Vec<KeyRange>,
        desc: bool,
    ) -> Self {
        // A point range addresses one full record key; a whole-prefix
        // range also ends at prefix_next(start) but starts short.
        let points = ranges
            .iter()
            .map(|r| r.start.len() == ROW_KEY_LEN && r.is_point())
            .collect();
        TableScan {
            reader: RangeReader::new(src, ctx, ts, desc, ranges, points),
            columns,
        }
    }
}

impl Executor for TableScan {
    fn next(&mut self) -> ExecResult<Option<Row>> {
        let Some((key, value)) = self.reader.next_kv()? else {
            return Ok(None);
        };
        let handle = decode_row_handle(&key)?;
        let pairs = decode_row(&value)?;
        let values = self
            .columns
            .iter()
            .map(|col| {
                if col.pk_handle {
                    return Datum::Int(handle);
                }
                pairs
                    .iter()
                    .find(|(id, _)| *id == col.col_id)
                    .map(|(_, d)| d.clone())
                    .or_else(|| col.default.clone())
                    .unwrap_or(Datum::Null)
            })
            .collect();
        Ok(Some(Row { handle, values }))
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        self.reader.cursor()
    }

    fn scanned_rows(&self) -> Vec<i64> {
        self.reader.counts()
    }
}

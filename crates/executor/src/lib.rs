//! Coprocessor executor pipeline
//!
//! Pull-based operators over the engine's snapshot reads: a scan leaf
//! (table or index) feeds selection, limit and top-N operators composed
//! into a chain. Each operator exclusively owns its source child; there
//! are no back links.
//!
//! Rows travel as a handle plus datums in the declared column order and
//! re-encode to the on-wire column-value form at the pipeline boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod datum;
mod error;
mod exec;
mod expr;
mod index_scan;
mod limit;
mod row;
mod scan;
mod selection;
mod table;
mod table_scan;
mod topn;

pub use datum::{cmp_datum, decode_datum, encode_datum, Datum};
pub use error::{ExecError, ExecResult};
pub use exec::{Executor, KeyRange, Row};
pub use expr::{CmpOp, Expr};
pub use index_scan::IndexScan;
pub use limit::Limit;
pub use row::{decode_row, encode_row};
pub use selection::Selection;
pub use table::{
    decode_row_handle, encode_handle_value, encode_index_key, encode_row_key, index_prefix,
    record_prefix, ColumnInfo, INDEX_KEY_PREFIX_LEN, ROW_KEY_LEN,
};
pub use table_scan::TableScan;
pub use topn::{OrderBy, TopN};

//! Operator contract

use crate::datum::Datum;
use crate::error::ExecResult;
use basalt_core::codec::prefix_next;

/// A materialised row: its handle plus datums in the declared column
/// order of the scan that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row handle.
    pub handle: i64,
    /// Column values in declared order.
    pub values: Vec<Datum>,
}

/// Half-open key range `[start, end)` of a scan request.
#[derive(Debug, Clone)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub start: Vec<u8>,
    /// Exclusive upper bound.
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Build a range.
    pub fn new(start: Vec<u8>, end: Vec<u8>) -> Self {
        KeyRange { start, end }
    }

    /// True when the range addresses exactly one key.
    pub fn is_point(&self) -> bool {
        self.end == prefix_next(&self.start)
    }
}

/// A pull-based operator.
///
/// Operators compose into a chain with a single scan leaf; each operator
/// exclusively owns its source.
pub trait Executor {
    /// Produce the next row, or `None` at end of stream.
    fn next(&mut self) -> ExecResult<Option<Row>>;

    /// Streaming resumption point: the key to restart from and whether
    /// the stream runs in reverse. Blocking operators (top-N) return an
    /// empty key.
    fn cursor(&self) -> (Vec<u8>, bool);

    /// Rows read from the store per declared KV range, for cost
    /// accounting.
    fn scanned_rows(&self) -> Vec<i64>;
}

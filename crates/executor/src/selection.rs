//! Selection operator

use crate::error::ExecResult;
use crate::exec::{Executor, Row};
use crate::expr::Expr;

/// Emits source rows for which every predicate evaluates truthy.
/// A NULL predicate result drops the row, as SQL filters do.
pub struct Selection {
    source: Box<dyn Executor>,
    conditions: Vec<Expr>,
}

impl Selection {
    /// Wrap `source`, keeping rows that satisfy all `conditions`.
    pub fn new(source: Box<dyn Executor>, conditions: Vec<Expr>) -> Self {
        Selection { source, conditions }
    }
}

impl Executor for Selection {
    fn next(&mut self) -> ExecResult<Option<Row>> {
        'rows: while let Some(row) = self.source.next()? {
            for condition in &self.conditions {
                if !condition.eval(&row)?.is_truthy() {
                    continue 'rows;
                }
            }
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        self.source.cursor()
    }

    fn scanned_rows(&self) -> Vec<i64> {
        self.source.scanned_rows()
    }
}

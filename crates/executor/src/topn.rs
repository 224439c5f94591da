//! Top-N operator
//!
//! Fully drains its source into a bounded max-heap keyed by the compound
//! order expression, then emits rows in sorted order. Inherently
//! blocking: there is no streaming resumption point.

use crate::datum::{cmp_datum, Datum};
use crate::error::ExecResult;
use crate::exec::{Executor, Row};
use crate::expr::Expr;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// One component of the compound order key.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// The sort expression.
    pub expr: Expr,
    /// Descending when true.
    pub desc: bool,
}

struct HeapRow {
    sort_key: Vec<Datum>,
    /// Arrival order; earlier rows win ties.
    seq: u64,
    row: Row,
    desc_flags: Arc<[bool]>,
}

impl HeapRow {
    /// The compound ordering requested by the query, ties broken by
    /// arrival order.
    fn query_cmp(&self, other: &Self) -> Ordering {
        for ((a, b), desc) in self
            .sort_key
            .iter()
            .zip(other.sort_key.iter())
            .zip(self.desc_flags.iter())
        {
            let ordering = cmp_datum(a, b);
            let ordering = if *desc { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.seq.cmp(&other.seq)
    }
}

impl PartialEq for HeapRow {
    fn eq(&self, other: &Self) -> bool {
        self.query_cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapRow {}

impl PartialOrd for HeapRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap: the root is the worst row under the query
// order, which is exactly the eviction candidate.
impl Ord for HeapRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.query_cmp(other)
    }
}

/// Keeps the `n` best rows under the compound order.
pub struct TopN {
    source: Box<dyn Executor>,
    order: Vec<OrderBy>,
    desc_flags: Arc<[bool]>,
    n: usize,
    drained: Option<std::vec::IntoIter<Row>>,
}

impl TopN {
    /// Wrap `source`, retaining the `n` smallest rows under `order`.
    pub fn new(source: Box<dyn Executor>, order: Vec<OrderBy>, n: usize) -> Self {
        let desc_flags: Arc<[bool]> = order.iter().map(|o| o.desc).collect();
        TopN {
            source,
            order,
            desc_flags,
            n,
            drained: None,
        }
    }

    fn drain_source(&mut self) -> ExecResult<std::vec::IntoIter<Row>> {
        let mut heap: BinaryHeap<HeapRow> = BinaryHeap::with_capacity(self.n + 1);
        let mut seq = 0u64;
        while let Some(row) = self.source.next()? {
            let mut sort_key = Vec::with_capacity(self.order.len());
            for order in &self.order {
                sort_key.push(order.expr.eval(&row)?);
            }
            heap.push(HeapRow {
                sort_key,
                seq,
                row,
                desc_flags: Arc::clone(&self.desc_flags),
            });
            seq += 1;
            if heap.len() > self.n {
                heap.pop();
            }
        }
        let rows: Vec<Row> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|hr| hr.row)
            .collect();
        Ok(rows.into_iter())
    }
}

impl Executor for TopN {
    fn next(&mut self) -> ExecResult<Option<Row>> {
        if self.drained.is_none() {
            let rows = self.drain_source()?;
            self.drained = Some(rows);
        }
        Ok(self.drained.as_mut().and_then(|it| it.next()))
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        // Blocking operator: no resumption point.
        let (_, desc) = self.source.cursor();
        (Vec::new(), desc)
    }

    fn scanned_rows(&self) -> Vec<i64> {
        self.source.scanned_rows()
    }
}

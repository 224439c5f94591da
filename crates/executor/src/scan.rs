//! Chunked range reading shared by the scan leaves
//!
//! Walks the declared ranges in order. Point ranges issue a snapshot
//! `get`; open ranges pull fixed-size chunks via `scan`/`reverse_scan`,
//! advancing the cursor past the last returned key (`prefix_next` going
//! forward, the key itself as the exclusive bound going backward).

use crate::error::ExecResult;
use crate::exec::KeyRange;
use basalt_core::codec::prefix_next;
use basalt_core::context::OpContext;
use basalt_core::traits::{KvPair, SnapshotSource};
use basalt_core::ts::Ts;
use std::collections::VecDeque;
use std::sync::Arc;

/// Rows fetched per chunk.
pub(crate) const SCAN_BATCH: usize = 128;

pub(crate) struct RangeReader {
    src: Arc<dyn SnapshotSource>,
    ctx: OpContext,
    ts: Ts,
    desc: bool,
    ranges: Vec<KeyRange>,
    /// Whether each range is a single-key lookup. Decided by the leaf:
    /// only it knows its key shapes (a whole-prefix range also ends at
    /// `prefix_next(start)` without being a point).
    points: Vec<bool>,
    range_idx: usize,
    /// Forward: next seek key. Reverse: exclusive upper bound.
    cursor: Option<Vec<u8>>,
    range_done: bool,
    buffer: VecDeque<KvPair>,
    counts: Vec<i64>,
}

impl RangeReader {
    pub(crate) fn new(
        src: Arc<dyn SnapshotSource>,
        ctx: OpContext,
        ts: Ts,
        desc: bool,
        ranges: Vec<KeyRange>,
        points: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(ranges.len(), points.len());
        let counts = vec![0; ranges.len()];
        RangeReader {
            src,
            ctx,
            ts,
            desc,
            ranges,
            points,
            range_idx: 0,
            cursor: None,
            range_done: false,
            buffer: VecDeque::new(),
            counts,
        }
    }

    /// The next raw key/value pair, across ranges.
    pub(crate) fn next_kv(&mut self) -> ExecResult<Option<KvPair>> {
        loop {
            if let Some(pair) = self.buffer.pop_front() {
                self.counts[self.range_idx] += 1;
                return Ok(Some(pair));
            }
            if self.range_idx >= self.ranges.len() {
                return Ok(None);
            }
            if self.range_done {
                self.range_idx += 1;
                self.cursor = None;
                self.range_done = false;
                continue;
            }
            self.fill_buffer()?;
        }
    }

    fn fill_buffer(&mut self) -> ExecResult<()> {
        let range = &self.ranges[self.range_idx];
        if self.points[self.range_idx] {
            if let Some(value) = self.src.get(&self.ctx, &range.start, self.ts)? {
                self.buffer.push_back((range.start.clone(), value));
            }
            self.range_done = true;
            return Ok(());
        }
        let pairs = if self.desc {
            let end = self.cursor.clone().unwrap_or_else(|| range.end.clone());
            self.src
                .reverse_scan(&self.ctx, &range.start, &end, SCAN_BATCH, self.ts)?
        } else {
            let start = self.cursor.clone().unwrap_or_else(|| range.start.clone());
            self.src
                .scan(&self.ctx, &start, &range.end, SCAN_BATCH, self.ts)?
        };
        if pairs.len() < SCAN_BATCH {
            self.range_done = true;
        }
        if let Some((last_key, _)) = pairs.last() {
            self.cursor = if self.desc {
                // Next chunk is bounded above by the last emitted key.
                Some(last_key.clone())
            } else {
                Some(prefix_next(last_key))
            };
        }
        self.buffer.extend(pairs);
        Ok(())
    }

    /// Resume key and direction for streaming.
    pub(crate) fn cursor(&self) -> (Vec<u8>, bool) {
        let key = match (&self.cursor, self.ranges.get(self.range_idx)) {
            (Some(cursor), _) => cursor.clone(),
            (None, Some(range)) if !self.desc => range.start.clone(),
            (None, Some(range)) => range.end.clone(),
            (None, None) => Vec::new(),
        };
        (key, self.desc)
    }

    pub(crate) fn counts(&self) -> Vec<i64> {
        self.counts.clone()
    }
}

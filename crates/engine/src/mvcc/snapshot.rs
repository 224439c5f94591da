//! Pinned MVCC read view
//!
//! The executor pipeline pulls many chunks for one coprocessor request;
//! pinning the backing-store view at construction keeps every chunk on
//! the same snapshot, per the consistency contract.

use crate::mvcc::reads;
use basalt_concurrency::RegionContext;
use basalt_core::context::OpContext;
use basalt_core::error::Result;
use basalt_core::traits::{KvPair, SnapshotSource, StoreView};
use basalt_core::ts::Ts;
use std::sync::Arc;

/// A snapshot-consistent read source over one pinned store view.
pub struct MvccSnapshot {
    view: Box<dyn StoreView>,
    region: Arc<RegionContext>,
}

impl MvccSnapshot {
    pub(crate) fn new(view: Box<dyn StoreView>, region: Arc<RegionContext>) -> Self {
        MvccSnapshot { view, region }
    }
}

impl SnapshotSource for MvccSnapshot {
    fn get(&self, ctx: &OpContext, key: &[u8], ts: Ts) -> Result<Option<Vec<u8>>> {
        ctx.check()?;
        reads::get_value(self.view.as_ref(), &self.region, key, ts)
    }

    fn scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        ts: Ts,
    ) -> Result<Vec<KvPair>> {
        ctx.check()?;
        reads::scan_values(self.view.as_ref(), &self.region, start, end, limit, ts)
    }

    fn reverse_scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        ts: Ts,
    ) -> Result<Vec<KvPair>> {
        ctx.check()?;
        reads::reverse_scan_values(self.view.as_ref(), &self.region, start, end, limit, ts)
    }
}

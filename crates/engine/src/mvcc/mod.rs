//! MVCC transaction engine

mod gc;
mod reads;
mod snapshot;
mod txn;

#[cfg(test)]
mod tests;

pub use snapshot::MvccSnapshot;

use crate::writer::WriteWorker;
use basalt_concurrency::{hash_key, RegionContext};
use basalt_core::batch::WriteBatch;
use basalt_core::context::OpContext;
use basalt_core::error::{Error, Result};
use basalt_core::record::LockOp;
use basalt_core::traits::{KvPair, Store, StoreView};
use basalt_core::ts::Ts;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The kind of a prewrite mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    /// Write `value` on commit.
    Put,
    /// Write a tombstone on commit.
    Del,
    /// Lock the key without changing it.
    Lock,
    /// Like `Put`, but fails when a visible value already exists.
    Insert,
}

/// One mutation in a prewrite request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// What to do.
    pub op: MutationOp,
    /// The user key.
    pub key: Vec<u8>,
    /// The value; empty for `Del` and `Lock`.
    pub value: Vec<u8>,
}

impl Mutation {
    /// A `Put` mutation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Mutation {
            op: MutationOp::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A `Del` mutation.
    pub fn del(key: impl Into<Vec<u8>>) -> Self {
        Mutation {
            op: MutationOp::Del,
            key: key.into(),
            value: Vec::new(),
        }
    }

    /// A `Lock` mutation.
    pub fn lock(key: impl Into<Vec<u8>>) -> Self {
        Mutation {
            op: MutationOp::Lock,
            key: key.into(),
            value: Vec::new(),
        }
    }

    /// An `Insert` mutation.
    pub fn insert(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Mutation {
            op: MutationOp::Insert,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A live lock reported by `scan_lock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// The locked key.
    pub key: Vec<u8>,
    /// Primary key of the owning transaction.
    pub primary: Vec<u8>,
    /// `start_ts` of the owning transaction.
    pub start_ts: Ts,
    /// Lease in milliseconds.
    pub ttl_ms: u64,
}

/// The percolator-style MVCC engine for one region.
///
/// Re-entrant: concurrent requests on disjoint keys proceed in parallel;
/// per-key operations are linearised by the region latches and a single
/// background writer serialises durability.
pub struct TxnEngine {
    store: Arc<dyn Store>,
    region: Arc<RegionContext>,
    writer: WriteWorker,
}

impl TxnEngine {
    /// Build an engine over `store` for the given region.
    pub fn new(store: Arc<dyn Store>, region: Arc<RegionContext>) -> Self {
        let writer = WriteWorker::new(Arc::clone(&store));
        TxnEngine {
            store,
            region,
            writer,
        }
    }

    /// The engine's region context.
    pub fn region(&self) -> &RegionContext {
        &self.region
    }

    /// Pin a read view for the executor pipeline.
    pub fn snapshot(&self) -> MvccSnapshot {
        MvccSnapshot::new(self.store.view(), Arc::clone(&self.region))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Snapshot point lookup at `start_ts`.
    pub fn get(&self, ctx: &OpContext, key: &[u8], start_ts: Ts) -> Result<Option<Vec<u8>>> {
        ctx.check()?;
        let view = self.store.view();
        reads::get_value(view.as_ref(), &self.region, key, start_ts)
    }

    /// Snapshot lookup of several keys; lock errors are reported per key.
    pub fn batch_get(
        &self,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        start_ts: Ts,
    ) -> Result<Vec<(Vec<u8>, Result<Option<Vec<u8>>>)>> {
        ctx.check()?;
        let view = self.store.view();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let result = reads::get_value(view.as_ref(), &self.region, key, start_ts);
            match result {
                Err(e) if e.is_region_error() => return Err(e),
                other => out.push((key.clone(), other)),
            }
        }
        Ok(out)
    }

    /// Ascending snapshot scan of `[start, end)`, at most `limit` pairs.
    pub fn scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        start_ts: Ts,
    ) -> Result<Vec<KvPair>> {
        ctx.check()?;
        let view = self.store.view();
        reads::scan_values(view.as_ref(), &self.region, start, end, limit, start_ts)
    }

    /// Descending snapshot scan of `[start, end)`.
    pub fn reverse_scan(
        &self,
        ctx: &OpContext,
        start: &[u8],
        end: &[u8],
        limit: usize,
        start_ts: Ts,
    ) -> Result<Vec<KvPair>> {
        ctx.check()?;
        let view = self.store.view();
        reads::reverse_scan_values(view.as_ref(), &self.region, start, end, limit, start_ts)
    }

    // ------------------------------------------------------------------
    // Transaction writes
    // ------------------------------------------------------------------

    /// First phase of two-phase commit: lock every mutated key.
    ///
    /// Returns the per-key failures. On any failure nothing is persisted
    /// and no keys enter the transaction index; the whole prewrite is
    /// retryable. An empty mutation list succeeds without writing.
    pub fn prewrite(
        &self,
        ctx: &OpContext,
        mutations: &[Mutation],
        primary: &[u8],
        start_ts: Ts,
        ttl_ms: u64,
    ) -> Result<Vec<(Vec<u8>, Error)>> {
        if mutations.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<&[u8]> = mutations.iter().map(|m| m.key.as_slice()).collect();
        let region = Arc::clone(&self.region);
        self.write_locked(ctx, &keys, |view| {
            let mut staged = BTreeMap::new();
            let mut failures = Vec::new();
            for mutation in mutations {
                match txn::prewrite_mutation(
                    view, &region, &mut staged, mutation, primary, start_ts, ttl_ms,
                ) {
                    Ok(()) => {}
                    Err(e) if e.is_per_key() => failures.push((mutation.key.clone(), e)),
                    Err(e) => return Err(e),
                }
            }
            if !failures.is_empty() {
                return Ok((WriteBatch::new(), failures));
            }
            let mut batch = WriteBatch::new();
            for (key, mixed) in &staged {
                batch.put(key.clone(), mixed.encode(), mixed.user_meta());
            }
            region
                .txn_index
                .add_keys(start_ts, staged.keys().map(|k| k.as_slice()));
            Ok((batch, Vec::new()))
        })
    }

    /// Second phase: make the transaction's writes visible at `commit_ts`.
    ///
    /// Idempotent for retried commits of the same `(start_ts, commit_ts)`.
    pub fn commit(
        &self,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        start_ts: Ts,
        commit_ts: Ts,
    ) -> Result<()> {
        if commit_ts <= start_ts {
            return Err(Error::aborted("commit_ts must exceed start_ts"));
        }
        if keys.is_empty() {
            return Ok(());
        }
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let region = Arc::clone(&self.region);
        self.write_locked(ctx, &key_refs, |view| {
            let mut batch = WriteBatch::new();
            for key in keys {
                txn::stage_commit_key(view, &mut batch, key, start_ts, commit_ts)?;
            }
            region.txn_index.remove(start_ts);
            region.record_size_diff(batch.approx_size());
            Ok((batch, ()))
        })
    }

    /// Roll the transaction back on the given keys, leaving markers that
    /// fence late prewrite retries.
    pub fn rollback(&self, ctx: &OpContext, keys: &[Vec<u8>], start_ts: Ts) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let region = Arc::clone(&self.region);
        self.write_locked(ctx, &key_refs, |view| {
            let mut batch = WriteBatch::new();
            for key in keys {
                txn::stage_rollback_key(view, &mut batch, key, start_ts)?;
            }
            region.txn_index.remove(start_ts);
            Ok((batch, ()))
        })
    }

    /// Resolve a single (usually primary) lock whose owner is presumed
    /// dead. With a non-zero `current_ts` the lock is only rolled back
    /// once its TTL has lapsed; `current_ts == 0` forces it.
    pub fn cleanup(
        &self,
        ctx: &OpContext,
        key: &[u8],
        start_ts: Ts,
        current_ts: Ts,
    ) -> Result<()> {
        self.write_locked(ctx, &[key], |view| {
            let mut batch = WriteBatch::new();
            txn::stage_cleanup_key(view, &mut batch, key, start_ts, current_ts)?;
            Ok((batch, ()))
        })
    }

    /// Report locks of transactions that started before `max_ts`,
    /// re-validated against the live records.
    pub fn scan_lock(&self, ctx: &OpContext, max_ts: Ts) -> Result<Vec<LockInfo>> {
        ctx.check()?;
        let view = self.store.view();
        let mut out = Vec::new();
        for (start_ts, keys) in self.region.txn_index.all_below(max_ts) {
            for key in keys {
                let Some(mixed) = reads::load_mixed(view.as_ref(), &key)? else {
                    continue;
                };
                if let Some(lock) = mixed.lock {
                    if lock.start_ts == start_ts && lock.op != LockOp::Rollback {
                        out.push(LockInfo {
                            key,
                            primary: lock.primary,
                            start_ts,
                            ttl_ms: lock.ttl_ms,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Commit (`commit_ts > 0`) or roll back (`commit_ts == 0`) every key
    /// the transaction index records for `start_ts`, in one batch. Keys
    /// whose lock has vanished or changed hands are skipped.
    pub fn resolve_lock(&self, ctx: &OpContext, start_ts: Ts, commit_ts: Ts) -> Result<()> {
        let keys = self.region.txn_index.keys(start_ts);
        if keys.is_empty() {
            self.region.txn_index.remove(start_ts);
            return Ok(());
        }
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let region = Arc::clone(&self.region);
        self.write_locked(ctx, &key_refs, |view| {
            let mut batch = WriteBatch::new();
            for key in &keys {
                let owns_lock = reads::load_mixed(view, key)?
                    .and_then(|m| m.lock)
                    .is_some_and(|l| l.start_ts == start_ts && l.op != LockOp::Rollback);
                if !owns_lock {
                    // Advisory index entry, already resolved lock, or a
                    // key some other transaction relocked: skip.
                    continue;
                }
                if commit_ts > 0 {
                    txn::stage_commit_key(view, &mut batch, key, start_ts, commit_ts)?;
                } else {
                    txn::stage_rollback_key(view, &mut batch, key, start_ts)?;
                }
            }
            region.txn_index.remove(start_ts);
            region.record_size_diff(batch.approx_size());
            Ok((batch, ()))
        })
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Delete every record in `[start, end)` together with its
    /// old-version shadows, in bounded latched batches.
    pub fn delete_range(&self, ctx: &OpContext, start: &[u8], end: &[u8]) -> Result<()> {
        let mut cursor = start.to_vec();
        loop {
            ctx.check()?;
            let view = self.store.view();
            let range_batch =
                gc::collect_range_batch(view.as_ref(), &cursor, end, gc::DELETE_RANGE_BATCH)?;
            drop(view);
            if range_batch.raw_keys.is_empty() {
                return Ok(());
            }
            let user_refs: Vec<&[u8]> = range_batch.user_keys.iter().map(|k| k.as_slice()).collect();
            self.write_locked(ctx, &user_refs, |_view| {
                let mut batch = WriteBatch::new();
                for raw in &range_batch.raw_keys {
                    batch.delete(raw.clone());
                }
                Ok((batch, ()))
            })?;
            match range_batch.next_cursor {
                Some(next) => cursor = next,
                None => return Ok(()),
            }
        }
    }

    /// Garbage-collect versions no longer reachable from any read
    /// timestamp above `safe_point`.
    pub fn gc(&self, ctx: &OpContext, safe_point: Ts) -> Result<()> {
        ctx.check()?;
        let writer = &self.writer;
        let flush = |batch: &mut WriteBatch| -> Result<()> {
            let staged = std::mem::take(batch);
            writer.submit(staged).wait(ctx)
        };

        let view = self.store.view();
        let mut batch = WriteBatch::new();
        let old_deleted =
            gc::stage_old_version_pass(view.as_ref(), &self.region, safe_point, &mut batch, flush)?;
        if !batch.is_empty() {
            writer.submit(std::mem::take(&mut batch)).wait(ctx)?;
        }
        drop(view);

        // Fresh view so the tombstone pass observes the old-version
        // deletions it must not orphan.
        let view = self.store.view();
        let (rollbacks, tombstones) =
            gc::stage_latest_pass(view.as_ref(), &self.region, safe_point, &mut batch, flush)?;
        if !batch.is_empty() {
            writer.submit(std::mem::take(&mut batch)).wait(ctx)?;
        }

        tracing::debug!(
            safe_point,
            old_deleted,
            rollbacks,
            tombstones,
            "gc pass finished"
        );
        Ok(())
    }

    // ------------------------------------------------------------------

    /// The shared write skeleton: latch, stage against a fresh view, hand
    /// the batch to the writer, release latches, await durability.
    fn write_locked<R>(
        &self,
        ctx: &OpContext,
        keys: &[&[u8]],
        stage: impl FnOnce(&dyn StoreView) -> Result<(WriteBatch, R)>,
    ) -> Result<R> {
        let mut hashes: SmallVec<[u64; 8]> = keys.iter().map(|k| hash_key(k)).collect();
        self.region.latches.normalize(&mut hashes);
        self.region.latches.acquire(&hashes, ctx)?;

        let staged = {
            let view = self.store.view();
            stage(view.as_ref())
        };
        let (batch, out) = match staged {
            Ok(v) => v,
            Err(e) => {
                self.region.latches.release(&hashes);
                return Err(e);
            }
        };
        if batch.is_empty() {
            self.region.latches.release(&hashes);
            return Ok(out);
        }
        // Hand off before releasing: the worker serialises batches in
        // submission order, so the next holder of these latches lands
        // strictly after us.
        let ack = self.writer.submit(batch);
        self.region.latches.release(&hashes);
        ack.wait(ctx)?;
        Ok(out)
    }
}

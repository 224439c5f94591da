//! Write-path staging
//!
//! These functions read the current mixed record through a latched view
//! and stage the outcome into a [`WriteBatch`]. They never touch the
//! store directly; the engine hands the finished batch to the write
//! worker.

use crate::mvcc::reads::{find_commit_trace, load_mixed, visible_version};
use crate::mvcc::{Mutation, MutationOp};
use basalt_concurrency::RegionContext;
use basalt_core::batch::WriteBatch;
use basalt_core::codec::encode_old_key;
use basalt_core::error::{Error, Result};
use basalt_core::record::{Lock, LockOp, Mixed, ValueKind, ValueRecord, OLD_META};
use basalt_core::traits::StoreView;
use basalt_core::ts::{ttl_expired, Ts};
use std::collections::BTreeMap;

/// Stage one prewrite mutation into `staged`, which carries records
/// already touched earlier in the same batch so a later mutation on the
/// same key sees (and replaces) the earlier lock.
pub(crate) fn prewrite_mutation(
    view: &dyn StoreView,
    region: &RegionContext,
    staged: &mut BTreeMap<Vec<u8>, Mixed>,
    mutation: &Mutation,
    primary: &[u8],
    start_ts: Ts,
    ttl_ms: u64,
) -> Result<()> {
    let key = &mutation.key;
    let mut mixed = match staged.get(key) {
        Some(m) => m.clone(),
        None => load_mixed(view, key)?.unwrap_or_default(),
    };

    // Carried forward when this prewrite replaces an older rollback
    // marker or re-stages the transaction's own lock.
    let mut rollback_ts = 0;

    if let Some(lock) = &mixed.lock {
        if lock.op != LockOp::Rollback {
            if lock.start_ts == start_ts {
                // Retried or repeated mutation of the same transaction:
                // the later mutation wins, keeping the single lock.
                rollback_ts = lock.rollback_ts;
            } else {
                if ttl_expired(lock.start_ts, lock.ttl_ms, start_ts) {
                    region.txn_index.add_key(lock.start_ts, key);
                }
                return Err(Error::KeyIsLocked {
                    key: key.clone(),
                    primary: lock.primary.clone(),
                    start_ts: lock.start_ts,
                    ttl_ms: lock.ttl_ms,
                });
            }
        } else if lock.start_ts >= start_ts {
            return Err(Error::aborted("already rolled back"));
        } else {
            // Newer transaction displaces the marker but keeps carrying
            // it, so a commit of this lock re-fences the rolled-back ts.
            rollback_ts = lock.start_ts;
        }
    }

    if let Some(value) = &mixed.value {
        if value.commit_ts > start_ts {
            return Err(Error::WriteConflict {
                start_ts,
                conflict_commit_ts: value.commit_ts,
            });
        }
    }

    if mutation.op == MutationOp::Insert {
        let existing = visible_version(view, key, &mixed, start_ts)?;
        if existing.is_some_and(|v| v.kind == ValueKind::Put) {
            return Err(Error::aborted("key already exists"));
        }
    }

    let (op, value) = match mutation.op {
        MutationOp::Put | MutationOp::Insert => (LockOp::Put, Some(mutation.value.clone())),
        MutationOp::Del => (LockOp::Del, None),
        MutationOp::Lock => (LockOp::Lock, None),
    };
    mixed.lock = Some(Lock {
        start_ts,
        primary: primary.to_vec(),
        value,
        op,
        ttl_ms,
        rollback_ts,
    });
    staged.insert(key.clone(), mixed);
    Ok(())
}

/// Stage the commit of one key at `commit_ts`.
pub(crate) fn stage_commit_key(
    view: &dyn StoreView,
    batch: &mut WriteBatch,
    key: &[u8],
    start_ts: Ts,
    commit_ts: Ts,
) -> Result<()> {
    let mut mixed = load_mixed(view, key)?.unwrap_or_default();

    let lock_matches = mixed
        .lock
        .as_ref()
        .is_some_and(|l| l.start_ts == start_ts && l.op != LockOp::Rollback);

    if !lock_matches {
        // A retried commit is idempotent when the write already landed:
        // either it is still the latest value, or it moved to old space
        // at exactly `commit_ts`.
        if let Some(value) = &mixed.value {
            if value.start_ts == start_ts {
                return Ok(());
            }
        }
        if let Some(entry) = view.get(&encode_old_key(key, commit_ts))? {
            if ValueRecord::decode(&entry.value)?.start_ts == start_ts {
                return Ok(());
            }
        }
        return match &mixed.lock {
            Some(lock) if lock.op == LockOp::Rollback && lock.start_ts == start_ts => {
                Err(Error::aborted("already rolled back"))
            }
            Some(_) => Err(Error::Replaced),
            None => Err(Error::LockNotFound),
        };
    }

    let lock = mixed.lock.take().expect("matched lock");
    match lock.op {
        LockOp::Lock => {
            // Read lock: drop it, value untouched.
        }
        LockOp::Put | LockOp::Del => {
            if let Some(prev) = mixed.value.take() {
                batch.put(encode_old_key(key, prev.commit_ts), prev.encode(), OLD_META);
            }
            let kind = if lock.op == LockOp::Del {
                ValueKind::Delete
            } else {
                ValueKind::Put
            };
            mixed.value = Some(ValueRecord {
                kind,
                start_ts,
                commit_ts,
                bytes: lock.value.unwrap_or_default(),
            });
        }
        LockOp::Rollback => unreachable!("rollback locks never match"),
    }
    if lock.rollback_ts != 0 {
        mixed.lock = Some(Lock::rollback_marker(lock.rollback_ts));
    }
    if mixed.is_empty() {
        batch.delete(key.to_vec());
    } else {
        batch.put(key.to_vec(), mixed.encode(), mixed.user_meta());
    }
    Ok(())
}

/// Stage the rollback of one key for transaction `start_ts`.
pub(crate) fn stage_rollback_key(
    view: &dyn StoreView,
    batch: &mut WriteBatch,
    key: &[u8],
    start_ts: Ts,
) -> Result<()> {
    let mut mixed = load_mixed(view, key)?.unwrap_or_default();

    match &mut mixed.lock {
        Some(lock) if lock.start_ts == start_ts => {
            if lock.op != LockOp::Rollback {
                // Replace rather than delete: prewrite is retryable, and
                // the marker fences a late retry of the same ts.
                *lock = Lock::rollback_marker(start_ts);
                batch.put(key.to_vec(), mixed.encode(), mixed.user_meta());
            }
            return Ok(());
        }
        Some(lock) if lock.start_ts < start_ts && lock.op != LockOp::Rollback => {
            // Rollback of a newer transaction piggy-backs on the older
            // write lock; commit will restore the marker.
            lock.rollback_ts = start_ts;
            batch.put(key.to_vec(), mixed.encode(), mixed.user_meta());
            return Ok(());
        }
        Some(lock) if lock.start_ts < start_ts => {
            // An older rollback marker: ours supersedes it. A marker
            // aborts every prewrite at or below its own ts, so the newer
            // marker fences both transactions.
            *lock = Lock::rollback_marker(start_ts);
            batch.put(key.to_vec(), mixed.encode(), mixed.user_meta());
            return Ok(());
        }
        _ => {}
    }

    // No lock of ours. Refuse if the transaction already committed.
    if let Some(value) = &mixed.value {
        if value.start_ts == start_ts {
            return Err(Error::AlreadyCommitted {
                commit_ts: value.commit_ts,
            });
        }
    }
    if let Some(commit_ts) = find_commit_trace(view, key, start_ts)? {
        return Err(Error::AlreadyCommitted { commit_ts });
    }

    if mixed.lock.is_none() {
        // No trace at all: fence a late-arriving prewrite.
        mixed.lock = Some(Lock::rollback_marker(start_ts));
        batch.put(key.to_vec(), mixed.encode(), mixed.user_meta());
    }
    // A newer transaction's lock stays untouched; its own resolution
    // will run through the write-conflict check anyway.
    Ok(())
}

/// Stage a single-key cleanup: roll the lock back if it is ours and has
/// outlived its TTL as observed at `current_ts` (`current_ts == 0`
/// forces resolution regardless of the lease).
pub(crate) fn stage_cleanup_key(
    view: &dyn StoreView,
    batch: &mut WriteBatch,
    key: &[u8],
    start_ts: Ts,
    current_ts: Ts,
) -> Result<()> {
    let mixed = load_mixed(view, key)?.unwrap_or_default();
    if let Some(lock) = &mixed.lock {
        if lock.start_ts == start_ts
            && lock.op != LockOp::Rollback
            && current_ts != 0
            && !ttl_expired(lock.start_ts, lock.ttl_ms, current_ts)
        {
            // Still within its lease; let the owner finish.
            return Err(Error::KeyIsLocked {
                key: key.to_vec(),
                primary: lock.primary.clone(),
                start_ts: lock.start_ts,
                ttl_ms: lock.ttl_ms,
            });
        }
    }
    stage_rollback_key(view, batch, key, start_ts)
}

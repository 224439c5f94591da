//! Range deletion and garbage collection passes
//!
//! Both walk the raw keyspace of a view and stage deletions. GC deletes
//! are conditional on the record's store version being unchanged since
//! the scan, so a concurrent prewrite or commit that rewrites a record
//! wins over the collector.

use basalt_concurrency::RegionContext;
use basalt_core::batch::WriteBatch;
use basalt_core::codec::{decode_old_ts, encode_old_key, old_user_key};
use basalt_core::error::Result;
use basalt_core::record::{LockOp, Mixed, DEL_FLAG, LOCK_FLAG, OLD_META, VALUE_FLAG};
use basalt_core::traits::StoreView;
use basalt_core::ts::{Ts, LOCK_VER};
use rustc_hash::FxHashSet;

/// Maximum records staged per DeleteRange batch.
pub(crate) const DELETE_RANGE_BATCH: usize = 256;

/// Flush threshold for GC delete batches.
pub(crate) const GC_BATCH: usize = 512;

/// One DeleteRange batch: raw store keys to remove, the user keys to
/// latch, and the cursor for the next batch (`None` when exhausted).
pub(crate) struct RangeBatch {
    pub raw_keys: Vec<Vec<u8>>,
    pub user_keys: FxHashSet<Vec<u8>>,
    pub next_cursor: Option<Vec<u8>>,
}

/// Collect the next batch of records in `[cursor, end)`, including
/// old-version shadows of in-range user keys.
pub(crate) fn collect_range_batch(
    view: &dyn StoreView,
    cursor: &[u8],
    end: &[u8],
    max: usize,
) -> Result<RangeBatch> {
    let mut raw_keys = Vec::new();
    let mut user_keys = FxHashSet::default();
    let mut iter = view.iter();
    let mut valid = iter.seek(cursor);
    // Shadows of the last in-range user key sort beyond `end` itself, so
    // the raw bound is the shadow space of `end`, not `end`.
    let raw_end = if end.is_empty() {
        Vec::new()
    } else {
        encode_old_key(end, LOCK_VER)
    };
    while valid && raw_keys.len() < max {
        let raw = iter.key();
        if !raw_end.is_empty() && raw >= raw_end.as_slice() {
            return Ok(RangeBatch {
                raw_keys,
                user_keys,
                next_cursor: None,
            });
        }
        let user = if iter.entry().user_meta == OLD_META {
            old_user_key(raw)
        } else {
            raw
        };
        if !end.is_empty() && user >= end {
            // A latest record at or past `end` that is not a shadow of an
            // in-range key.
            valid = iter.next();
            continue;
        }
        user_keys.insert(user.to_vec());
        raw_keys.push(raw.to_vec());
        valid = iter.next();
    }
    let next_cursor = if valid && raw_keys.len() == max {
        Some(iter.key().to_vec())
    } else {
        None
    };
    Ok(RangeBatch {
        raw_keys,
        user_keys,
        next_cursor,
    })
}

/// Old-version pass: stage deletion of versions at or below `safe_point`.
///
/// When a key's latest committed value is still above the safe point, its
/// newest old version at or below it stays reachable for reads between
/// the safe point and that commit, so it is retained; everything older
/// goes. When the latest value itself is at or below the safe point, all
/// old versions are unreachable and go.
pub(crate) fn stage_old_version_pass(
    view: &dyn StoreView,
    region: &RegionContext,
    safe_point: Ts,
    batch: &mut WriteBatch,
    mut flush: impl FnMut(&mut WriteBatch) -> Result<()>,
) -> Result<usize> {
    let mut deleted = 0;
    let mut iter = view.iter();
    let mut valid = iter.seek(region.start_key());
    let end = region.end_key().to_vec();

    let mut current_key: Vec<u8> = Vec::new();
    let mut latest_commit: Ts = 0;
    let mut retained_newest = false;

    while valid {
        if iter.entry().user_meta != OLD_META {
            valid = iter.next();
            continue;
        }
        let raw = iter.key().to_vec();
        let user = old_user_key(&raw);
        if !end.is_empty() && user >= end.as_slice() {
            break;
        }
        if user != current_key.as_slice() {
            current_key = user.to_vec();
            latest_commit = match view.get(user)? {
                Some(entry) => Mixed::decode(&entry.value)?
                    .value
                    .map(|v| v.commit_ts)
                    .unwrap_or(0),
                None => 0,
            };
            retained_newest = false;
        }
        let version_ts = decode_old_ts(&raw)?;
        if version_ts <= safe_point {
            if latest_commit > safe_point && !retained_newest {
                // Newest version below the safe point stays visible to
                // reads between safe_point and latest_commit.
                retained_newest = true;
            } else {
                batch.delete_if_version(raw, iter.entry().version);
                deleted += 1;
                if batch.len() >= GC_BATCH {
                    flush(batch)?;
                }
            }
        }
        valid = iter.next();
    }
    Ok(deleted)
}

/// Tombstone/rollback pass: stage deletion of latest records that carry
/// only dead state. The `user_meta` flag byte filters candidates without
/// a full decode.
pub(crate) fn stage_latest_pass(
    view: &dyn StoreView,
    region: &RegionContext,
    safe_point: Ts,
    batch: &mut WriteBatch,
    mut flush: impl FnMut(&mut WriteBatch) -> Result<()>,
) -> Result<(usize, usize)> {
    let mut rollbacks = 0;
    let mut tombstones = 0;
    let mut iter = view.iter();
    let mut valid = iter.seek(region.start_key());
    let end = region.end_key().to_vec();

    while valid {
        let meta = iter.entry().user_meta;
        if meta == OLD_META {
            valid = iter.next();
            continue;
        }
        let raw = iter.key().to_vec();
        if !end.is_empty() && raw >= end {
            break;
        }
        if meta == LOCK_FLAG {
            // Lock with no value: reclaim stale rollback markers.
            let mixed = Mixed::decode(&iter.entry().value)?;
            if mixed
                .lock
                .is_some_and(|l| l.op == LockOp::Rollback && l.start_ts <= safe_point)
            {
                batch.delete_if_version(raw, iter.entry().version);
                rollbacks += 1;
            }
        } else if meta == (VALUE_FLAG | DEL_FLAG) {
            // Unlocked tombstone: reclaim once nothing above the safe
            // point can still read through it.
            let mixed = Mixed::decode(&iter.entry().value)?;
            if mixed.value.is_some_and(|v| v.commit_ts <= safe_point) {
                batch.delete_if_version(raw, iter.entry().version);
                tombstones += 1;
            }
        }
        if batch.len() >= GC_BATCH {
            flush(batch)?;
        }
        valid = iter.next();
    }
    Ok((rollbacks, tombstones))
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::record::ValueRecord;
    use basalt_core::traits::Store;
    use basalt_core::ValueKind;
    use basalt_storage::MemStore;

    fn old_put(batch: &mut WriteBatch, key: &[u8], start_ts: Ts, commit_ts: Ts, value: &[u8]) {
        let record = ValueRecord {
            kind: ValueKind::Put,
            start_ts,
            commit_ts,
            bytes: value.to_vec(),
        };
        batch.put(encode_old_key(key, commit_ts), record.encode(), OLD_META);
    }

    #[test]
    fn test_collect_range_batch_spans_shadows() {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"m".to_vec(), VALUE_FLAG);
        old_put(&mut batch, b"a", 1, 2, b"v");
        batch.put(b"b".to_vec(), b"m".to_vec(), VALUE_FLAG);
        batch.put(b"z".to_vec(), b"m".to_vec(), VALUE_FLAG);
        store.write(batch).unwrap();

        let view = store.view();
        let out = collect_range_batch(view.as_ref(), b"a", b"c", 100).unwrap();
        assert_eq!(out.raw_keys.len(), 3); // a, a-shadow, b
        assert_eq!(out.user_keys.len(), 2);
        assert!(out.next_cursor.is_none());
    }

    #[test]
    fn test_collect_range_batch_bounded() {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        for i in 0..10u8 {
            batch.put(vec![i], b"m".to_vec(), VALUE_FLAG);
        }
        store.write(batch).unwrap();
        let view = store.view();
        let out = collect_range_batch(view.as_ref(), &[0], &[], 4).unwrap();
        assert_eq!(out.raw_keys.len(), 4);
        assert_eq!(out.next_cursor, Some(vec![4]));
    }
}

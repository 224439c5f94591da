//! Snapshot read paths shared by the engine and its pinned snapshots
//!
//! All functions operate on a borrowed [`StoreView`], so the same code
//! serves one-shot engine reads and long-lived executor snapshots.

use basalt_concurrency::RegionContext;
use basalt_core::codec::{encode_old_key, old_user_key, prefix_next, OLD_SUFFIX_LEN};
use basalt_core::error::{Error, Result};
use basalt_core::record::{Lock, Mixed, ValueKind, ValueRecord, OLD_META};
use basalt_core::traits::{KvPair, StoreView};
use basalt_core::ts::{ttl_expired, Ts, LOCK_VER};

/// Decode the mixed record at `key`, or an empty record if absent.
pub(crate) fn load_mixed(view: &dyn StoreView, key: &[u8]) -> Result<Option<Mixed>> {
    match view.get(key)? {
        Some(entry) => Ok(Some(Mixed::decode(&entry.value)?)),
        None => Ok(None),
    }
}

/// Apply the lock-visibility rule for a read at `start_ts`.
///
/// A `Put`/`Del` lock from an older transaction blocks the read, unless
/// it is the reader's own primary marked with the `LOCK_VER` sentinel.
/// When the blocking lock has outlived its TTL, an advisory hint is
/// planted in the region's transaction index so resolvers find it
/// without rescanning.
pub(crate) fn check_lock(
    region: &RegionContext,
    key: &[u8],
    lock: &Lock,
    start_ts: Ts,
) -> Result<()> {
    if lock.op.blocks_reads()
        && lock.start_ts < start_ts
        && !(lock.primary == key && lock.start_ts == LOCK_VER)
    {
        if ttl_expired(lock.start_ts, lock.ttl_ms, start_ts) {
            region.txn_index.add_key(lock.start_ts, key);
        }
        return Err(Error::KeyIsLocked {
            key: key.to_vec(),
            primary: lock.primary.clone(),
            start_ts: lock.start_ts,
            ttl_ms: lock.ttl_ms,
        });
    }
    Ok(())
}

/// The newest version of `key` visible at `ts`, given its mixed record.
///
/// Prefers the latest committed value; falls back to a forward seek in
/// old-version space. Old-version probes always run forward, whatever
/// direction the enclosing scan moves in: the complemented suffix already
/// yields newest-first order inside a user-key prefix.
pub(crate) fn visible_version(
    view: &dyn StoreView,
    key: &[u8],
    mixed: &Mixed,
    ts: Ts,
) -> Result<Option<ValueRecord>> {
    if let Some(value) = &mixed.value {
        if value.commit_ts <= ts {
            return Ok(Some(value.clone()));
        }
    }
    seek_old_version(view, key, ts)
}

/// Forward-seek the newest old version of `key` with `commit_ts <= ts`.
fn seek_old_version(view: &dyn StoreView, key: &[u8], ts: Ts) -> Result<Option<ValueRecord>> {
    let target = encode_old_key(key, ts);
    let mut iter = view.iter();
    let mut valid = iter.seek(&target);
    while valid {
        let raw = iter.key();
        if !raw.starts_with(key) {
            break;
        }
        // Keys that merely embed `key` as a prefix (longer user keys and
        // their shadows) are skipped; only an exact shadow of `key` counts.
        if raw.len() == key.len() + OLD_SUFFIX_LEN && iter.entry().user_meta == OLD_META {
            return Ok(Some(ValueRecord::decode(&iter.entry().value)?));
        }
        valid = iter.next();
    }
    Ok(None)
}

/// Walk `key`'s old versions newest-first looking for one written by
/// `start_ts`; returns its `commit_ts` when found.
pub(crate) fn find_commit_trace(
    view: &dyn StoreView,
    key: &[u8],
    start_ts: Ts,
) -> Result<Option<Ts>> {
    let mut iter = view.iter();
    let mut valid = iter.seek(&encode_old_key(key, LOCK_VER));
    while valid {
        let raw = iter.key();
        if !raw.starts_with(key) {
            break;
        }
        if raw.len() == key.len() + OLD_SUFFIX_LEN && iter.entry().user_meta == OLD_META {
            let record = ValueRecord::decode(&iter.entry().value)?;
            if record.start_ts == start_ts {
                return Ok(Some(record.commit_ts));
            }
            // Versions iterate newest-first; once commits predate the
            // transaction no older version can belong to it.
            if record.commit_ts < start_ts {
                break;
            }
        }
        valid = iter.next();
    }
    Ok(None)
}

/// Point lookup at `ts`.
pub(crate) fn get_value(
    view: &dyn StoreView,
    region: &RegionContext,
    key: &[u8],
    ts: Ts,
) -> Result<Option<Vec<u8>>> {
    let Some(mixed) = load_mixed(view, key)? else {
        return Ok(None);
    };
    if let Some(lock) = &mixed.lock {
        check_lock(region, key, lock, ts)?;
    }
    Ok(visible_version(view, key, &mixed, ts)?.and_then(|v| match v.kind {
        ValueKind::Put => Some(v.bytes),
        ValueKind::Delete => None,
    }))
}

/// Ascending scan of `[start, end)` at `ts`, up to `limit` pairs.
pub(crate) fn scan_values(
    view: &dyn StoreView,
    region: &RegionContext,
    start: &[u8],
    end: &[u8],
    limit: usize,
    ts: Ts,
) -> Result<Vec<KvPair>> {
    let mut out = Vec::new();
    if limit == 0 {
        return Ok(out);
    }
    let mut iter = view.iter();
    let mut valid = iter.seek(start);
    while valid && out.len() < limit {
        if !end.is_empty() && iter.key() >= end {
            break;
        }
        if iter.entry().user_meta == OLD_META {
            // Shadow with no latest record in range; a point read of this
            // key would come back empty, so the scan skips it too.
            let hop = prefix_next(old_user_key(iter.key()));
            valid = iter.seek(&hop);
            continue;
        }
        let user_key = iter.key().to_vec();
        let mixed = Mixed::decode(&iter.entry().value)?;
        if let Some(lock) = &mixed.lock {
            check_lock(region, &user_key, lock, ts)?;
        }
        if let Some(version) = visible_version(view, &user_key, &mixed, ts)? {
            if version.kind == ValueKind::Put {
                out.push((user_key.clone(), version.bytes));
            }
        }
        valid = iter.seek(&prefix_next(&user_key));
    }
    Ok(out)
}

/// Descending scan of `[start, end)` at `ts`, up to `limit` pairs.
///
/// Seeks to the record just before `end` and walks user keys backwards,
/// stopping once a key precedes `start`. An empty `end` means "from the
/// top of the keyspace".
pub(crate) fn reverse_scan_values(
    view: &dyn StoreView,
    region: &RegionContext,
    start: &[u8],
    end: &[u8],
    limit: usize,
    ts: Ts,
) -> Result<Vec<KvPair>> {
    let mut out = Vec::new();
    if limit == 0 {
        return Ok(out);
    }
    let mut iter = view.iter();
    let mut valid = if end.is_empty() {
        iter.seek_to_last()
    } else {
        let mut v = iter.seek_for_prev(end);
        if v && iter.key() == end {
            v = iter.prev();
        }
        v
    };
    while valid && out.len() < limit {
        let user_key = if iter.entry().user_meta == OLD_META {
            old_user_key(iter.key()).to_vec()
        } else {
            iter.key().to_vec()
        };
        if user_key.as_slice() < start {
            break;
        }
        if let Some(mixed) = load_mixed(view, &user_key)? {
            if let Some(lock) = &mixed.lock {
                check_lock(region, &user_key, lock, ts)?;
            }
            if let Some(version) = visible_version(view, &user_key, &mixed, ts)? {
                if version.kind == ValueKind::Put {
                    out.push((user_key.clone(), version.bytes));
                }
            }
        }
        // Step to the record strictly before this user key.
        valid = iter.seek_for_prev(&user_key);
        if valid && iter.key() == user_key.as_slice() {
            valid = iter.prev();
        }
    }
    Ok(out)
}

//! Engine-level MVCC tests

use super::*;
use basalt_core::codec::encode_old_key;
use basalt_core::record::{LockOp, Mixed, ValueKind};
use basalt_core::ts::compose_ts;
use basalt_storage::MemStore;

const TTL: u64 = 3000;

fn new_engine() -> (Arc<MemStore>, TxnEngine) {
    let store = Arc::new(MemStore::new());
    let region = Arc::new(RegionContext::new(Vec::new(), Vec::new()));
    let dyn_store: Arc<dyn Store> = store.clone();
    let engine = TxnEngine::new(dyn_store, region);
    (store, engine)
}

fn ctx() -> OpContext {
    OpContext::new()
}

fn must_prewrite(engine: &TxnEngine, mutations: &[Mutation], primary: &[u8], start_ts: Ts) {
    let failures = engine
        .prewrite(&ctx(), mutations, primary, start_ts, TTL)
        .unwrap();
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
}

fn must_prewrite_put(engine: &TxnEngine, key: &[u8], value: &[u8], primary: &[u8], start_ts: Ts) {
    must_prewrite(engine, &[Mutation::put(key, value)], primary, start_ts);
}

fn must_prewrite_err(
    engine: &TxnEngine,
    mutations: &[Mutation],
    primary: &[u8],
    start_ts: Ts,
) -> Vec<(Vec<u8>, Error)> {
    let failures = engine
        .prewrite(&ctx(), mutations, primary, start_ts, TTL)
        .unwrap();
    assert!(!failures.is_empty(), "prewrite unexpectedly succeeded");
    failures
}

fn must_commit(engine: &TxnEngine, keys: &[&[u8]], start_ts: Ts, commit_ts: Ts) {
    let keys: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    engine.commit(&ctx(), &keys, start_ts, commit_ts).unwrap();
}

fn must_commit_err(engine: &TxnEngine, keys: &[&[u8]], start_ts: Ts, commit_ts: Ts) -> Error {
    let keys: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    engine.commit(&ctx(), &keys, start_ts, commit_ts).unwrap_err()
}

fn must_rollback(engine: &TxnEngine, keys: &[&[u8]], start_ts: Ts) {
    let keys: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    engine.rollback(&ctx(), &keys, start_ts).unwrap();
}

fn must_rollback_err(engine: &TxnEngine, keys: &[&[u8]], start_ts: Ts) -> Error {
    let keys: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    engine.rollback(&ctx(), &keys, start_ts).unwrap_err()
}

fn must_get(engine: &TxnEngine, key: &[u8], ts: Ts, expect: &[u8]) {
    assert_eq!(
        engine.get(&ctx(), key, ts).unwrap().as_deref(),
        Some(expect),
        "get {key:?} @{ts}"
    );
}

fn must_get_none(engine: &TxnEngine, key: &[u8], ts: Ts) {
    assert_eq!(engine.get(&ctx(), key, ts).unwrap(), None, "get {key:?} @{ts}");
}

fn must_get_locked(engine: &TxnEngine, key: &[u8], ts: Ts) -> Error {
    let err = engine.get(&ctx(), key, ts).unwrap_err();
    assert!(matches!(err, Error::KeyIsLocked { .. }), "got {err:?}");
    err
}

fn latest_mixed(store: &MemStore, key: &[u8]) -> Option<Mixed> {
    store
        .view()
        .get(key)
        .unwrap()
        .map(|e| Mixed::decode(&e.value).unwrap())
}

// ----------------------------------------------------------------------
// End-to-end scenarios
// ----------------------------------------------------------------------

#[test]
fn test_empty_prewrite_writes_nothing() {
    let (store, engine) = new_engine();
    must_prewrite(&engine, &[], b"\x01", 100);
    assert!(store.is_empty());
}

#[test]
fn test_single_key_commit() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"\x03", b"\x2a", b"\x01", 100);
    must_commit(&engine, &[b"\x03"], 100, 101);
    must_get(&engine, b"\x03", 102, b"\x2a");

    let mixed = latest_mixed(&store, b"\x03").unwrap();
    assert!(mixed.lock.is_none());
    let value = mixed.value.unwrap();
    assert_eq!(value.bytes, b"\x2a");
    assert_eq!((value.start_ts, value.commit_ts), (100, 101));
}

#[test]
fn test_second_prewrite_on_locked_key_fails() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"\x03", b"\x2a", b"\x01", 100);
    let failures = must_prewrite_err(&engine, &[Mutation::put(b"\x03", b"\x35")], b"\x01", 101);
    assert_eq!(failures.len(), 1);
    match &failures[0].1 {
        Error::KeyIsLocked { start_ts, .. } => assert_eq!(*start_ts, 100),
        other => panic!("expected KeyIsLocked, got {other:?}"),
    }
    // Store still holds the first transaction's lock and value.
    let mixed = latest_mixed(&store, b"\x03").unwrap();
    let lock = mixed.lock.unwrap();
    assert_eq!(lock.start_ts, 100);
    assert_eq!(lock.value.as_deref(), Some(b"\x2a".as_slice()));
}

#[test]
fn test_prewrite_overwrite_within_batch() {
    let (store, engine) = new_engine();
    must_prewrite(
        &engine,
        &[Mutation::put(b"\x03", b"\x2a"), Mutation::put(b"\x03", b"\x2d")],
        b"\x01",
        100,
    );
    let mixed = latest_mixed(&store, b"\x03").unwrap();
    let lock = mixed.lock.unwrap();
    assert_eq!(lock.value.as_deref(), Some(b"\x2d".as_slice()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_prewrite_multi_mutation_with_del() {
    let (store, engine) = new_engine();
    must_prewrite(
        &engine,
        &[
            Mutation::put(b"\x03", b"\x2a"),
            Mutation::put(b"\x04", b"\x2b"),
            Mutation::insert(b"\x05", b"\x2c"),
            Mutation::del(b"\x04"),
            Mutation::insert(b"\x04", [1u8, 3, 5]),
            Mutation::put(b"\xff", b"\x2d"),
        ],
        b"\x01",
        100,
    );
    for key in [b"\x03".as_slice(), b"\x04", b"\x05", b"\xff"] {
        let lock = latest_mixed(&store, key).unwrap().lock.unwrap();
        assert_eq!(lock.start_ts, 100, "key {key:?}");
    }
    let lock4 = latest_mixed(&store, b"\x04").unwrap().lock.unwrap();
    assert_eq!(lock4.op, LockOp::Put);
    assert_eq!(lock4.value.as_deref(), Some([1u8, 3, 5].as_slice()));
    assert_eq!(store.len(), 4);
}

#[test]
fn test_rollback_then_late_prewrite() {
    let (store, engine) = new_engine();
    must_rollback(&engine, &[b"\x07"], 200);
    let marker = latest_mixed(&store, b"\x07").unwrap().lock.unwrap();
    assert_eq!(marker.op, LockOp::Rollback);
    assert_eq!(marker.start_ts, 200);

    let failures = must_prewrite_err(&engine, &[Mutation::put(b"\x07", b"v")], b"\x07", 200);
    assert!(matches!(failures[0].1, Error::Aborted(_)));

    must_prewrite_put(&engine, b"\x07", b"v", b"\x07", 201);
    must_commit(&engine, &[b"\x07"], 201, 205);
    must_get(&engine, b"\x07", 210, b"v");
}

// ----------------------------------------------------------------------
// Invariant properties
// ----------------------------------------------------------------------

#[test]
fn test_commit_visibility_boundary() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite_put(&engine, b"k", b"v2", b"k", 30);
    must_commit(&engine, &[b"k"], 30, 40);

    must_get_none(&engine, b"k", 15);
    must_get(&engine, b"k", 20, b"v1");
    must_get(&engine, b"k", 39, b"v1");
    must_get(&engine, b"k", 40, b"v2");
    must_get(&engine, b"k", 1000, b"v2");
}

#[test]
fn test_commit_is_idempotent() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 15);
    let before = latest_mixed(&store, b"k");
    must_commit(&engine, &[b"k"], 10, 15);
    assert_eq!(latest_mixed(&store, b"k"), before);

    // Still idempotent once the value moved to old space.
    must_prewrite_put(&engine, b"k", b"v2", b"k", 20);
    must_commit(&engine, &[b"k"], 20, 25);
    must_commit(&engine, &[b"k"], 10, 15);
    must_get(&engine, b"k", 30, b"v2");
}

#[test]
fn test_commit_without_lock_fails() {
    let (_store, engine) = new_engine();
    assert_eq!(must_commit_err(&engine, &[b"k"], 1, 2), Error::LockNotFound);
}

#[test]
fn test_commit_against_foreign_lock_fails_replaced() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    assert_eq!(must_commit_err(&engine, &[b"k"], 5, 8), Error::Replaced);
}

#[test]
fn test_commit_rejects_inverted_timestamps() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    assert!(matches!(
        must_commit_err(&engine, &[b"k"], 10, 10),
        Error::Aborted(_)
    ));
}

#[test]
fn test_rollback_after_commit_fails_and_does_not_mutate() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 15);
    let before = latest_mixed(&store, b"k");
    assert_eq!(
        must_rollback_err(&engine, &[b"k"], 10),
        Error::AlreadyCommitted { commit_ts: 15 }
    );
    assert_eq!(latest_mixed(&store, b"k"), before);

    // Also detected via the old-version trace once superseded.
    must_prewrite_put(&engine, b"k", b"v2", b"k", 20);
    must_commit(&engine, &[b"k"], 20, 25);
    assert_eq!(
        must_rollback_err(&engine, &[b"k"], 10),
        Error::AlreadyCommitted { commit_ts: 15 }
    );
}

#[test]
fn test_repeated_prewrite_does_not_double_lock() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    must_prewrite_put(&engine, b"k", b"v", b"k", 10);
    let mixed = latest_mixed(&store, b"k").unwrap();
    assert!(mixed.lock.is_some());
    assert_eq!(store.len(), 1);
    must_commit(&engine, &[b"k"], 10, 15);
    must_get(&engine, b"k", 20, b"v");
}

#[test]
fn test_write_conflict_on_newer_commit() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    let failures = must_prewrite_err(&engine, &[Mutation::put(b"k", b"v2")], b"k", 15);
    assert_eq!(
        failures[0].1,
        Error::WriteConflict {
            start_ts: 15,
            conflict_commit_ts: 20
        }
    );
}

#[test]
fn test_insert_fails_on_existing_value() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    let failures = must_prewrite_err(&engine, &[Mutation::insert(b"k", b"v2")], b"k", 30);
    assert!(matches!(failures[0].1, Error::Aborted(_)));

    // After a committed delete the insert goes through.
    must_prewrite(&engine, &[Mutation::del(b"k")], b"k", 40);
    must_commit(&engine, &[b"k"], 40, 45);
    must_prewrite(&engine, &[Mutation::insert(b"k", b"v3")], b"k", 50);
    must_commit(&engine, &[b"k"], 50, 55);
    must_get(&engine, b"k", 60, b"v3");
}

#[test]
fn test_read_ignores_newer_lock() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite_put(&engine, b"k", b"v2", b"k", 50);
    // Reader at 30 predates the lock: unaffected.
    must_get(&engine, b"k", 30, b"v1");
    // Reader at 60 trips over it.
    must_get_locked(&engine, b"k", 60);
}

#[test]
fn test_read_lock_op_does_not_block_readers() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite(&engine, &[Mutation::lock(b"k")], b"k", 30);
    must_get(&engine, b"k", 40, b"v1");
    must_commit(&engine, &[b"k"], 30, 35);
    must_get(&engine, b"k", 40, b"v1");
}

#[test]
fn test_ttl_expired_lock_plants_resolver_hint() {
    let (_store, engine) = new_engine();
    let lock_ts = compose_ts(1_000, 0);
    must_prewrite_put(&engine, b"k", b"v", b"primary", lock_ts);
    // Physical clock far past the lease.
    let read_ts = compose_ts(10_000, 0);
    must_get_locked(&engine, b"k", read_ts);
    assert_eq!(engine.region().txn_index.keys(lock_ts), vec![b"k".to_vec()]);
}

#[test]
fn test_batch_get_reports_per_key_errors() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"a", b"1", b"a", 10);
    must_commit(&engine, &[b"a"], 10, 15);
    must_prewrite_put(&engine, b"b", b"2", b"b", 20);

    let results = engine
        .batch_get(&ctx(), &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()], 30)
        .unwrap();
    assert_eq!(results[0].1.as_ref().unwrap().as_deref(), Some(b"1".as_slice()));
    assert!(matches!(results[1].1, Err(Error::KeyIsLocked { .. })));
    assert_eq!(results[2].1.as_ref().unwrap(), &None);
}

#[test]
fn test_cancelled_context_short_circuits() {
    let (_store, engine) = new_engine();
    let op = OpContext::new();
    op.cancel_handle().cancel();
    assert_eq!(engine.get(&op, b"k", 10), Err(Error::Cancelled));
    assert_eq!(
        engine.commit(&op, &[b"k".to_vec()], 1, 2),
        Err(Error::Cancelled)
    );
}

// ----------------------------------------------------------------------
// Scans
// ----------------------------------------------------------------------

fn seed_scan_data(engine: &TxnEngine) {
    // a..e committed at (10, 20); c gets a newer version at (30, 40);
    // d becomes a tombstone at (30, 40).
    for key in [b"a", b"b", b"c", b"d", b"e"] {
        must_prewrite_put(engine, key, &[key[0], b'1'], b"a", 10);
    }
    must_commit(engine, &[b"a", b"b", b"c", b"d", b"e"], 10, 20);
    must_prewrite(
        engine,
        &[Mutation::put(b"c", b"c2"), Mutation::del(b"d")],
        b"c",
        30,
    );
    must_commit(engine, &[b"c", b"d"], 30, 40);
}

#[test]
fn test_scan_selects_versions_per_timestamp() {
    let (_store, engine) = new_engine();
    seed_scan_data(&engine);

    // Between the two commits: everything at version 1.
    let pairs = engine.scan(&ctx(), b"a", b"", 100, 35).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"a".as_slice(), b"b", b"c", b"d", b"e"]);
    assert_eq!(pairs[2].1, b"c1");

    // After the second commit: c upgraded, d tombstoned away.
    let pairs = engine.scan(&ctx(), b"a", b"", 100, 45).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"a".as_slice(), b"b", b"c", b"e"]);
    assert_eq!(pairs[2].1, b"c2");

    // Before anything committed: empty.
    assert!(engine.scan(&ctx(), b"a", b"", 100, 15).unwrap().is_empty());
}

#[test]
fn test_scan_respects_bounds_and_limit() {
    let (_store, engine) = new_engine();
    seed_scan_data(&engine);
    let pairs = engine.scan(&ctx(), b"b", b"e", 100, 45).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"b".as_slice(), b"c"]);

    let pairs = engine.scan(&ctx(), b"a", b"", 2, 45).unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].0, b"b");
}

#[test]
fn test_reverse_scan_mirrors_forward() {
    let (_store, engine) = new_engine();
    seed_scan_data(&engine);
    let pairs = engine.reverse_scan(&ctx(), b"a", b"", 100, 45).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"e".as_slice(), b"c", b"b", b"a"]);

    // Bounded: [b, e) descending, stops before a.
    let pairs = engine.reverse_scan(&ctx(), b"b", b"e", 100, 45).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"c".as_slice(), b"b"]);

    let pairs = engine.reverse_scan(&ctx(), b"a", b"", 2, 35).unwrap();
    let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"e".as_slice(), b"d"]);
}

#[test]
fn test_scan_surfaces_lock_error() {
    let (_store, engine) = new_engine();
    seed_scan_data(&engine);
    must_prewrite_put(&engine, b"b", b"b2", b"b", 50);
    let err = engine.scan(&ctx(), b"a", b"", 100, 60).unwrap_err();
    assert!(matches!(err, Error::KeyIsLocked { .. }));
    // Scans below the lock's start_ts pass.
    assert_eq!(engine.scan(&ctx(), b"a", b"", 100, 45).unwrap().len(), 4);
}

// ----------------------------------------------------------------------
// Lock scanning and resolution
// ----------------------------------------------------------------------

#[test]
fn test_scan_lock_reports_live_locks() {
    let (_store, engine) = new_engine();
    must_prewrite(
        &engine,
        &[Mutation::put(b"a", b"1"), Mutation::put(b"b", b"2")],
        b"a",
        100,
    );
    must_prewrite_put(&engine, b"c", b"3", b"c", 200);

    let locks = engine.scan_lock(&ctx(), 150).unwrap();
    assert_eq!(locks.len(), 2);
    assert!(locks.iter().all(|l| l.start_ts == 100));
    assert!(locks.iter().all(|l| l.primary == b"a"));

    let locks = engine.scan_lock(&ctx(), 300).unwrap();
    assert_eq!(locks.len(), 3);
}

#[test]
fn test_scan_lock_skips_rollback_markers_and_stale_hints() {
    let (_store, engine) = new_engine();
    must_rollback(&engine, &[b"r"], 100);
    // A stale advisory hint pointing at the rolled-back key.
    engine.region().txn_index.add_key(100, b"r");
    // And one pointing at a key with no record at all.
    engine.region().txn_index.add_key(100, b"ghost");
    assert!(engine.scan_lock(&ctx(), 200).unwrap().is_empty());
}

#[test]
fn test_resolve_lock_commits_all_keys() {
    let (_store, engine) = new_engine();
    must_prewrite(
        &engine,
        &[Mutation::put(b"a", b"1"), Mutation::put(b"b", b"2")],
        b"a",
        100,
    );
    engine.resolve_lock(&ctx(), 100, 120).unwrap();
    must_get(&engine, b"a", 130, b"1");
    must_get(&engine, b"b", 130, b"2");
    assert!(engine.region().txn_index.keys(100).is_empty());
}

#[test]
fn test_resolve_lock_rolls_back_all_keys() {
    let (store, engine) = new_engine();
    must_prewrite(
        &engine,
        &[Mutation::put(b"a", b"1"), Mutation::put(b"b", b"2")],
        b"a",
        100,
    );
    engine.resolve_lock(&ctx(), 100, 0).unwrap();
    must_get_none(&engine, b"a", 130);
    must_get_none(&engine, b"b", 130);
    // Markers fence a late retry.
    let marker = latest_mixed(&store, b"a").unwrap().lock.unwrap();
    assert_eq!(marker.op, LockOp::Rollback);
    let failures = must_prewrite_err(&engine, &[Mutation::put(b"a", b"1")], b"a", 100);
    assert!(matches!(failures[0].1, Error::Aborted(_)));
}

#[test]
fn test_resolve_lock_skips_foreign_locks() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"a", b"1", b"a", 100);
    must_commit(&engine, &[b"a"], 100, 110);
    // Stale hint for ts 100 now points at a key relocked by ts 120.
    must_prewrite_put(&engine, b"a", b"2", b"a", 120);
    engine.region().txn_index.add_key(100, b"a");
    engine.resolve_lock(&ctx(), 100, 130).unwrap();
    // The newer lock survived.
    must_get_locked(&engine, b"a", 140);
}

#[test]
fn test_cleanup_respects_ttl() {
    let (_store, engine) = new_engine();
    let lock_ts = compose_ts(1_000, 0);
    must_prewrite_put(&engine, b"k", b"v", b"k", lock_ts);

    // Within the lease: refused.
    let current = compose_ts(2_000, 0);
    let err = engine.cleanup(&ctx(), b"k", lock_ts, current).unwrap_err();
    assert!(matches!(err, Error::KeyIsLocked { .. }));

    // Past the lease: rolled back.
    let current = compose_ts(10_000, 0);
    engine.cleanup(&ctx(), b"k", lock_ts, current).unwrap();
    assert!(matches!(
        must_commit_err(&engine, &[b"k"], lock_ts, lock_ts + 1),
        Error::Aborted(_)
    ));
}

#[test]
fn test_cleanup_forced_and_after_commit() {
    let (_store, engine) = new_engine();
    let lock_ts = compose_ts(1_000, 0);
    must_prewrite_put(&engine, b"k", b"v", b"k", lock_ts);
    // current_ts == 0 forces resolution regardless of the lease.
    engine.cleanup(&ctx(), b"k", lock_ts, 0).unwrap();

    must_prewrite_put(&engine, b"j", b"v", b"j", 10);
    must_commit(&engine, &[b"j"], 10, 15);
    assert_eq!(
        engine.cleanup(&ctx(), b"j", 10, 0).unwrap_err(),
        Error::AlreadyCommitted { commit_ts: 15 }
    );
}

#[test]
fn test_rollback_piggybacks_on_older_lock() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v", b"k", 100);
    // A newer transaction's rollback arrives while 100 still holds the lock.
    must_rollback(&engine, &[b"k"], 150);
    let lock = latest_mixed(&store, b"k").unwrap().lock.unwrap();
    assert_eq!(lock.start_ts, 100);
    assert_eq!(lock.rollback_ts, 150);

    // Committing 100 keeps the fence alive as a rollback marker.
    must_commit(&engine, &[b"k"], 100, 110);
    let mixed = latest_mixed(&store, b"k").unwrap();
    let marker = mixed.lock.unwrap();
    assert_eq!(marker.op, LockOp::Rollback);
    assert_eq!(marker.start_ts, 150);
    must_get(&engine, b"k", 120, b"v");

    // The fenced transaction can never prewrite here.
    let failures = must_prewrite_err(&engine, &[Mutation::put(b"k", b"x")], b"k", 150);
    assert!(matches!(failures[0].1, Error::Aborted(_)));
}

// ----------------------------------------------------------------------
// DeleteRange and GC
// ----------------------------------------------------------------------

#[test]
fn test_delete_range_removes_all_versions() {
    let (store, engine) = new_engine();
    seed_scan_data(&engine);
    engine.delete_range(&ctx(), b"a", b"d").unwrap();

    for ts in [25, 45, 1000] {
        let pairs = engine.scan(&ctx(), b"a", b"d", 100, ts).unwrap();
        assert!(pairs.is_empty(), "ts {ts}: {pairs:?}");
    }
    // d and e survive (d only as a tombstoned history).
    must_get(&engine, b"e", 45, b"e1");
    // No raw records of any kind remain in the range, shadows included.
    let view = store.view();
    let mut iter = view.iter();
    assert!(iter.seek(b"a"));
    assert!(iter.key() >= b"d".as_slice());
}

#[test]
fn test_gc_retains_versions_reachable_above_safe_point() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite_put(&engine, b"k", b"v2", b"k", 30);
    must_commit(&engine, &[b"k"], 30, 40);

    // v1 is still the version a read between 25 and 39 resolves to.
    engine.gc(&ctx(), 25).unwrap();
    must_get(&engine, b"k", 35, b"v1");
    must_get(&engine, b"k", 45, b"v2");
}

#[test]
fn test_gc_drops_versions_below_safe_point() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite_put(&engine, b"k", b"v2", b"k", 30);
    must_commit(&engine, &[b"k"], 30, 40);

    engine.gc(&ctx(), 45).unwrap();
    // The superseded version is gone; the latest survives.
    let view = store.view();
    assert!(view.get(&encode_old_key(b"k", 20)).unwrap().is_none());
    must_get(&engine, b"k", 50, b"v2");
}

#[test]
fn test_gc_reclaims_tombstones_and_rollbacks() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite(&engine, &[Mutation::del(b"k")], b"k", 30);
    must_commit(&engine, &[b"k"], 30, 40);
    must_rollback(&engine, &[b"r"], 35);

    engine.gc(&ctx(), 50).unwrap();
    assert!(store.view().get(b"k").unwrap().is_none());
    assert!(store.view().get(b"r").unwrap().is_none());
    assert!(store.is_empty());
}

#[test]
fn test_gc_leaves_live_state_alone() {
    let (store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"v1", b"k", 100);
    must_commit(&engine, &[b"k"], 100, 110);
    must_prewrite_put(&engine, b"l", b"v", b"l", 120);
    must_rollback(&engine, &[b"r"], 130);

    engine.gc(&ctx(), 50).unwrap();
    must_get(&engine, b"k", 200, b"v1");
    assert!(latest_mixed(&store, b"l").unwrap().lock.is_some());
    assert!(latest_mixed(&store, b"r").unwrap().lock.is_some());
}

#[test]
fn test_scenario_gc_tombstone_under_old_versions() {
    let (store, engine) = new_engine();
    // Three generations ending in a delete, collected in one pass.
    must_prewrite_put(&engine, b"k", b"v1", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    must_prewrite_put(&engine, b"k", b"v2", b"k", 30);
    must_commit(&engine, &[b"k"], 30, 40);
    must_prewrite(&engine, &[Mutation::del(b"k")], b"k", 50);
    must_commit(&engine, &[b"k"], 50, 60);

    engine.gc(&ctx(), 70).unwrap();
    assert!(store.is_empty());
    must_get_none(&engine, b"k", 100);
}

// ----------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------

#[test]
fn test_parallel_commits_on_disjoint_keys() {
    let (_store, engine) = new_engine();
    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for t in 0..8u64 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            let key = format!("key-{t}").into_bytes();
            let start_ts = 10 + t * 10;
            let op = OpContext::new();
            let failures = engine
                .prewrite(&op, &[Mutation::put(key.clone(), b"v")], &key, start_ts, TTL)
                .unwrap();
            assert!(failures.is_empty());
            engine
                .commit(&op, &[key.clone()], start_ts, start_ts + 5)
                .unwrap();
            key
        }));
    }
    for handle in handles {
        let key = handle.join().unwrap();
        must_get(&engine, &key, 1000, b"v");
    }
}

#[test]
fn test_contended_prewrite_admits_exactly_one() {
    let (_store, engine) = new_engine();
    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for t in 0..4u64 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            let op = OpContext::new();
            let start_ts = 100 + t;
            engine
                .prewrite(&op, &[Mutation::put(b"hot", b"v")], b"hot", start_ts, TTL)
                .unwrap()
                .is_empty()
        }));
    }
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_size_diff_accumulates_on_commit() {
    let (_store, engine) = new_engine();
    must_prewrite_put(&engine, b"k", b"some-value", b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    assert!(engine.region().size_diff() > 0);
}

#[test]
fn test_value_kind_round_trip_through_engine() {
    let (store, engine) = new_engine();
    must_prewrite(&engine, &[Mutation::del(b"k")], b"k", 10);
    must_commit(&engine, &[b"k"], 10, 20);
    let value = latest_mixed(&store, b"k").unwrap().value.unwrap();
    assert_eq!(value.kind, ValueKind::Delete);
    must_get_none(&engine, b"k", 30);
}

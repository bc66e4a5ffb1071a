// Transaction lifecycle tests
// Snapshot boundaries, write registration, commit and abort on one thread.

use txn_conflict::{ConflictEngine, ConflictKind, Error, Options, TxnState};

fn small_engine() -> ConflictEngine {
    ConflictEngine::with_options(Options::with_shards(64)).unwrap()
}

// =============================================================================
// Test 1: Commit after snapshot invalidates older snapshots on that shard
// =============================================================================
#[test]
fn stale_snapshot_conflicts_fresh_snapshot_succeeds() {
    let engine = ConflictEngine::new();
    assert_eq!(engine.latest_seq_id(), 0);

    let mut t1 = engine.begin();
    t1.record_snapshot_id();
    assert_eq!(t1.snapshot_seq_id(), 0);

    // T2 takes its snapshot before T1 commits
    let mut t2 = engine.begin();
    t2.record_snapshot_id();

    assert!(t1.register_write(5));
    assert_eq!(t1.commit(), Some(1));
    assert_eq!(engine.latest_seq_id(), 1);
    assert_eq!(engine.shard_seq_id(5), 1);

    assert!(!t2.register_write(5));

    let mut t3 = engine.begin();
    t3.record_snapshot_id();
    assert_eq!(t3.snapshot_seq_id(), 1);
    assert!(t3.register_write(5));
}

// =============================================================================
// Test 2: Abort releases the claim without advancing the shard
// =============================================================================
#[test]
fn abort_releases_claim() {
    let engine = ConflictEngine::new();

    let mut t1 = engine.begin();
    t1.record_snapshot_id();
    assert!(t1.register_write(7));
    assert_eq!(engine.shard_owner(7), Some(t1.id()));
    t1.abort();

    assert_eq!(engine.shard_owner(7), None);
    assert_eq!(engine.shard_seq_id(7), 0);

    let mut t2 = engine.begin();
    t2.record_snapshot_id();
    assert!(t2.register_write(7));
}

// =============================================================================
// Test 3: Uncommitted claim blocks other writers until released
// =============================================================================
#[test]
fn live_claim_blocks_other_writer() {
    let engine = small_engine();

    let mut a = engine.begin();
    let mut b = engine.begin();
    a.record_snapshot_id();
    b.record_snapshot_id();

    assert!(a.register_write(3));
    assert_eq!(
        b.try_register_write(3).unwrap_err().kind,
        ConflictKind::Claimed { owner: a.id() }
    );

    a.abort();
    assert!(b.register_write(3));
}

// =============================================================================
// Test 4: Re-registering an owned shard is always granted
// =============================================================================
#[test]
fn reregister_owned_shard() {
    let engine = small_engine();
    let mut txn = engine.begin();
    txn.record_snapshot_id();

    assert!(txn.register_write(10));
    assert!(txn.register_write(10));
    // 74 mod 64 == 10: same shard through a different hash
    assert!(txn.register_write(74));
    assert_eq!(txn.touched_shards().collect::<Vec<_>>(), vec![10]);
}

// =============================================================================
// Test 5: Different hashes aliasing to one shard conflict (false positive)
// =============================================================================
#[test]
fn aliased_hashes_conflict() {
    let engine = small_engine();
    let mut a = engine.begin();
    let mut b = engine.begin();
    a.record_snapshot_id();
    b.record_snapshot_id();

    assert!(a.register_write(1));
    assert!(!b.register_write(65));
}

// =============================================================================
// Test 6: Abort is idempotent and a no-op after commit
// =============================================================================
#[test]
fn abort_idempotent() {
    let engine = small_engine();

    let mut txn = engine.begin();
    txn.record_snapshot_id();
    assert!(txn.register_write(2));
    let seq = txn.commit().unwrap();

    let latest = engine.latest_seq_id();
    txn.abort();
    txn.abort();
    assert_eq!(txn.state(), TxnState::Committed);
    assert_eq!(engine.latest_seq_id(), latest);
    assert_eq!(engine.shard_seq_id(2), seq);
    assert_eq!(engine.stats().aborts, 0);

    let mut other = engine.begin();
    other.record_snapshot_id();
    assert!(other.register_write(4));
    other.abort();
    other.abort();
    assert_eq!(other.state(), TxnState::Aborted);
    assert_eq!(engine.shard_owner(4), None);
    assert_eq!(engine.stats().aborts, 1);
}

// =============================================================================
// Test 7: Commit is a no-op once terminal
// =============================================================================
#[test]
fn commit_idempotent() {
    let engine = small_engine();

    let mut txn = engine.begin();
    txn.record_snapshot_id();
    assert_eq!(txn.commit(), Some(1));
    assert_eq!(txn.commit(), None);
    assert_eq!(engine.latest_seq_id(), 1);

    let mut aborted = engine.begin();
    aborted.abort();
    assert_eq!(aborted.commit(), None);
    assert_eq!(engine.latest_seq_id(), 1);
}

// =============================================================================
// Test 8: Dropping an active handle releases its claims
// =============================================================================
#[test]
fn drop_aborts() {
    let engine = small_engine();
    {
        let mut txn = engine.begin();
        txn.record_snapshot_id();
        assert!(txn.register_write(20));
        assert!(txn.register_write(21));
    }
    assert_eq!(engine.shard_owner(20), None);
    assert_eq!(engine.shard_owner(21), None);
    assert_eq!(engine.shard_seq_id(20), 0);
    assert_eq!(engine.stats().aborts, 1);
}

// =============================================================================
// Test 9: Disjoint transactions commit with strictly increasing seq ids
// =============================================================================
#[test]
fn disjoint_commits_increase() {
    let engine = small_engine();
    let mut last = 0;

    for shard in 0..32u64 {
        let mut txn = engine.begin();
        txn.record_snapshot_id();
        assert!(txn.register_write(shard));
        assert!(txn.register_write(shard + 32));
        let seq = txn.commit().unwrap();
        assert!(seq > last);
        last = seq;
    }
    assert_eq!(engine.latest_seq_id(), 32);
}

// =============================================================================
// Test 10: Without a snapshot only ownership conflicts apply
// =============================================================================
#[test]
fn no_snapshot_sees_everything() {
    let engine = small_engine();

    let mut writer = engine.begin();
    writer.record_snapshot_id();
    assert!(writer.register_write(9));
    writer.commit();

    let mut txn = engine.begin();
    assert_eq!(txn.state(), TxnState::Created);
    assert!(txn.register_write(9));
}

// =============================================================================
// Test 11: Committed writes release ownership
// =============================================================================
#[test]
fn commit_clears_owner() {
    let engine = small_engine();
    let mut txn = engine.begin();
    txn.record_snapshot_id();
    assert!(txn.register_write(11));
    txn.commit();

    assert_eq!(engine.shard_owner(11), None);
    assert_eq!(txn.touched_shards().count(), 0);
    assert!(!txn.is_active());
}

// =============================================================================
// Test 12: Key-based registration reports the conflict as an error
// =============================================================================
#[test]
fn register_key_conflict_error() {
    let engine = small_engine();
    let mut a = engine.begin();
    let mut b = engine.begin();
    a.record_snapshot_id();
    b.record_snapshot_id();

    a.register_key(b"account:42").unwrap();
    let err = b.register_key(b"account:42").unwrap_err();
    match err {
        Error::Conflict(c) => {
            assert_eq!(c.kind, ConflictKind::Claimed { owner: a.id() });
            assert!(c.is_retryable());
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

// =============================================================================
// Test 13: Stats count each kind of refusal
// =============================================================================
#[test]
fn stats_track_conflicts() {
    let engine = small_engine();

    let mut stale = engine.begin();
    stale.record_snapshot_id();

    let mut a = engine.begin();
    a.record_snapshot_id();
    assert!(a.register_write(1));
    a.commit();

    let mut b = engine.begin();
    b.record_snapshot_id();
    assert!(b.register_write(2));

    let mut c = engine.begin();
    c.record_snapshot_id();
    assert!(!c.register_write(2));
    assert!(!stale.register_write(1));

    let stats = engine.stats();
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.stale_conflicts, 1);
    assert_eq!(stats.claimed_conflicts, 1);
    assert_eq!(stats.conflicts(), 2);
}

pub mod conflict;

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::engine::ConflictEngine;
use crate::error::Result;
use crate::hash::conflict_key;
use crate::types::{SeqId, ShardIndex, TxnId, TxnState, UNSET_SNAPSHOT};
use conflict::{Conflict, ConflictKind};

/// One in-flight transaction's write footprint.
///
/// Usage:
/// 1. `engine.begin()` assigns a fresh id
/// 2. `record_snapshot_id()` fixes the visibility boundary
/// 3. `register_write(hash)` for every write; `false` means abort
/// 4. `commit()` publishes every claimed shard at one sequence id
///
/// Dropping the handle aborts it, so claims never leak on early return or
/// unwind. `commit` and `abort` are both no-ops once the handle is terminal.
pub struct Transaction<'a> {
    engine: &'a ConflictEngine,
    id: TxnId,
    snapshot_seq_id: SeqId,
    touched: BTreeSet<ShardIndex>,
    state: TxnState,
}

impl<'a> Transaction<'a> {
    /// Create a handle with a fresh id and no snapshot.
    pub fn new(engine: &'a ConflictEngine) -> Self {
        Self {
            engine,
            id: engine.next_transaction_id(),
            snapshot_seq_id: UNSET_SNAPSHOT,
            touched: BTreeSet::new(),
            state: TxnState::Created,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    /// The recorded boundary, or `UNSET_SNAPSHOT` if none was taken.
    pub fn snapshot_seq_id(&self) -> SeqId {
        self.snapshot_seq_id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Shards this transaction currently claims, in ascending order.
    pub fn touched_shards(&self) -> impl Iterator<Item = ShardIndex> + '_ {
        self.touched.iter().copied()
    }

    /// Take the read snapshot: everything committed up to now is visible,
    /// anything committed later to a shard we write is a conflict.
    ///
    /// Call once, before the first `register_write`.
    pub fn record_snapshot_id(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.snapshot_seq_id = self.engine.latest_seq_id();
        self.state = TxnState::SnapshotTaken;
        trace!(txn_id = self.id, snapshot = self.snapshot_seq_id, "snapshot recorded");
    }

    /// Claim the shard for `hash`. Returns false on conflict; the caller
    /// should then abort and, if it wants, retry with a new snapshot.
    pub fn register_write(&mut self, hash: u64) -> bool {
        self.try_register_write(hash).is_ok()
    }

    /// Like [`register_write`](Self::register_write), reporting why a claim
    /// was refused.
    pub fn try_register_write(&mut self, hash: u64) -> std::result::Result<(), Conflict> {
        let table = self.engine.table();
        let shard = table.index(hash);

        if self.state.is_terminal() {
            return Err(Conflict {
                shard,
                kind: ConflictKind::Finished,
            });
        }
        if self.touched.contains(&shard) {
            return Ok(());
        }

        // Fast path: already committed past our snapshot.
        self.check_fresh(shard)?;
        self.claim(shard)
    }

    /// CAS the shard's owner to us, then re-check freshness.
    fn claim(&mut self, shard: ShardIndex) -> std::result::Result<(), Conflict> {
        let table = self.engine.table();
        if let Err(owner) = table.try_claim(shard, self.id) {
            self.engine.record_claimed_conflict();
            debug!(txn_id = self.id, shard, owner, "write conflict: shard claimed");
            return Err(Conflict {
                shard,
                kind: ConflictKind::Claimed { owner },
            });
        }

        // A commit may have published this shard between the caller's freshness
        // check and our claim. The claim synchronizes with that publish, so look again.
        if let Err(conflict) = self.check_fresh(shard) {
            table.release(shard, self.id);
            return Err(conflict);
        }

        self.touched.insert(shard);
        trace!(txn_id = self.id, shard, "shard claimed");
        Ok(())
    }

    /// Hash a record key and register it.
    pub fn register_key(&mut self, key: &[u8]) -> Result<()> {
        self.try_register_write(conflict_key(key))?;
        Ok(())
    }

    fn check_fresh(&self, shard: ShardIndex) -> std::result::Result<(), Conflict> {
        let committed_seq_id = self.engine.table().seq_id(shard);
        if committed_seq_id > self.snapshot_seq_id {
            self.engine.record_stale_conflict();
            debug!(
                txn_id = self.id,
                shard,
                committed_seq_id,
                snapshot = self.snapshot_seq_id,
                "write conflict: stale snapshot"
            );
            return Err(Conflict {
                shard,
                kind: ConflictKind::StaleSnapshot { committed_seq_id },
            });
        }
        Ok(())
    }

    /// Publish every claimed shard at a new commit sequence id.
    ///
    /// Returns the sequence id, or `None` if the handle was already
    /// committed or aborted. Every commit consumes a sequence id, including
    /// one with no writes.
    ///
    /// # Panics
    /// Panics if a claimed shard is owned by another transaction, which
    /// means the conflict table is corrupt.
    pub fn commit(&mut self) -> Option<SeqId> {
        if self.state.is_terminal() {
            return None;
        }

        let guard = self.engine.begin_commit();
        // Verify every claim before stamping anything: a failure here must
        // leave the table and the watermark untouched.
        for &shard in &self.touched {
            assert!(
                guard.owns(shard, self.id),
                "txn {} committing shard {} it does not own",
                self.id,
                shard
            );
        }

        let seq = guard.next_seq_id();
        for &shard in &self.touched {
            guard.publish(shard, seq, self.id);
        }
        guard.finish(seq);

        debug!(txn_id = self.id, seq_id = seq, shards = self.touched.len(), "committed");
        self.touched.clear();
        self.state = TxnState::Committed;
        Some(seq)
    }

    /// Release every claim without publishing. Safe to call repeatedly and
    /// after `commit`.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let table = self.engine.table();
        for &shard in &self.touched {
            table.release(shard, self.id);
        }

        self.engine.record_abort();
        debug!(txn_id = self.id, shards = self.touched.len(), "aborted");
        self.touched.clear();
        self.state = TxnState::Aborted;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.abort();
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("snapshot_seq_id", &self.snapshot_seq_id)
            .field("state", &self.state)
            .field("touched", &self.touched.len())
            .finish()
    }
}

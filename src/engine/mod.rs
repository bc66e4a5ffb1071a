pub(crate) mod table;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;
use crate::options::Options;
use crate::txn::Transaction;
use crate::types::{NO_OWNER, SeqId, ShardIndex, TxnId};
use table::ShardTable;

/// Process-wide conflict engine. One per storage instance, shared by every
/// transaction.
///
/// Owns:
///   - the published commit watermark (`latest_seq_id`)
///   - the transaction id generator
///   - the commit lock, which totally orders commits
///   - the sharded conflict table
///
/// The engine never initiates work. Transactions drive it through
/// [`ConflictEngine::begin`].
pub struct ConflictEngine {
    latest_seq_id: AtomicU64,
    next_txn_id: AtomicU64,
    commit_lock: Mutex<()>,
    table: ShardTable,
    counters: Counters,
}

/// Monitoring counters. Relaxed; never used for correctness.
#[derive(Default)]
struct Counters {
    commits: AtomicU64,
    aborts: AtomicU64,
    stale_conflicts: AtomicU64,
    claimed_conflicts: AtomicU64,
}

/// Point-in-time copy of the engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub commits: u64,
    pub aborts: u64,
    /// Registrations refused because the shard was committed after the snapshot.
    pub stale_conflicts: u64,
    /// Registrations refused because another live transaction owned the shard.
    pub claimed_conflicts: u64,
}

impl EngineStats {
    pub fn conflicts(&self) -> u64 {
        self.stale_conflicts + self.claimed_conflicts
    }
}

impl Default for ConflictEngine {
    fn default() -> Self {
        Self::build(&Options::default())
    }
}

impl ConflictEngine {
    /// Engine with the default 2^20-shard table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom options. Fails if the options are invalid.
    pub fn with_options(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(&options))
    }

    fn build(options: &Options) -> Self {
        debug!(num_shards = options.num_shards, "creating conflict engine");
        Self {
            latest_seq_id: AtomicU64::new(0),
            next_txn_id: AtomicU64::new(NO_OWNER + 1),
            commit_lock: Mutex::new(()),
            table: ShardTable::new(options.num_shards),
            counters: Counters::default(),
        }
    }

    /// Start a new transaction with a fresh id.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Highest commit sequence id published so far. Use as a snapshot boundary.
    pub fn latest_seq_id(&self) -> SeqId {
        self.latest_seq_id.load(Ordering::Acquire)
    }

    pub fn num_shards(&self) -> usize {
        self.table.len()
    }

    /// Shard a conflict hash maps to.
    pub fn shard_of(&self, hash: u64) -> ShardIndex {
        self.table.index(hash)
    }

    /// Sequence id of the last commit that wrote to `shard` (0 if none).
    ///
    /// # Panics
    /// Panics if `shard >= num_shards()`.
    pub fn shard_seq_id(&self, shard: ShardIndex) -> SeqId {
        self.table.seq_id(shard)
    }

    /// Transaction currently holding an uncommitted claim on `shard`.
    ///
    /// # Panics
    /// Panics if `shard >= num_shards()`.
    pub fn shard_owner(&self, shard: ShardIndex) -> Option<TxnId> {
        match self.table.owner(shard) {
            NO_OWNER => None,
            id => Some(id),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        EngineStats {
            commits: c.commits.load(Ordering::Relaxed),
            aborts: c.aborts.load(Ordering::Relaxed),
            stale_conflicts: c.stale_conflicts.load(Ordering::Relaxed),
            claimed_conflicts: c.claimed_conflicts.load(Ordering::Relaxed),
        }
    }

    // ---- transaction-facing interface ----

    pub(crate) fn next_transaction_id(&self) -> TxnId {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn table(&self) -> &ShardTable {
        &self.table
    }

    /// Enter the commit critical section. Dropping the guard leaves it.
    pub(crate) fn begin_commit(&self) -> CommitGuard<'_> {
        CommitGuard {
            engine: self,
            _lock: self.commit_lock.lock(),
        }
    }

    pub(crate) fn record_abort(&self) {
        self.counters.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_conflict(&self) {
        self.counters.stale_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_claimed_conflict(&self) {
        self.counters.claimed_conflicts.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for ConflictEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictEngine")
            .field("latest_seq_id", &self.latest_seq_id())
            .field("num_shards", &self.num_shards())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Holds the commit lock. Only one exists at a time per engine.
///
/// Commit protocol:
///   1. `seq = next_seq_id()`
///   2. `publish(shard, seq, id)` for every touched shard
///   3. `finish(seq)` makes `seq` the new watermark
///
/// Shards are stamped before the watermark moves, so a snapshot that
/// already includes `seq` never finds a touched shard still claimed.
pub(crate) struct CommitGuard<'a> {
    engine: &'a ConflictEngine,
    _lock: MutexGuard<'a, ()>,
}

impl CommitGuard<'_> {
    /// Sequence id the current commit will publish at.
    pub(crate) fn next_seq_id(&self) -> SeqId {
        // Only written under the lock we hold.
        self.engine.latest_seq_id.load(Ordering::Relaxed) + 1
    }

    pub(crate) fn owns(&self, shard: ShardIndex, id: TxnId) -> bool {
        self.engine.table.owner(shard) == id
    }

    pub(crate) fn publish(&self, shard: ShardIndex, seq: SeqId, id: TxnId) -> bool {
        self.engine.table.publish(shard, seq, id)
    }

    pub(crate) fn finish(self, seq: SeqId) {
        self.engine.latest_seq_id.store(seq, Ordering::Release);
        self.engine.counters.commits.fetch_add(1, Ordering::Relaxed);
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{NO_OWNER, SeqId, ShardIndex, TxnId};

/// One slot of the conflict table.
///
/// `seq_id` is written only under the commit lock. `owner` is claimed and
/// released with compare-and-swap, so check-then-claim can't be split by
/// another registration on the same shard.
pub(crate) struct ShardSlot {
    seq_id: AtomicU64,
    owner: AtomicU64,
}

impl ShardSlot {
    fn new() -> Self {
        Self {
            seq_id: AtomicU64::new(0),
            owner: AtomicU64::new(NO_OWNER),
        }
    }
}

/// Fixed-size table mapping shard → (last committed seq id, current owner).
///
/// ```text
///  shard:    0      1      2      3     ...   N-1
///  seq_id: [ 0 ] [ 7 ] [ 0 ] [ 3 ]  ...  [ 0 ]
///  owner:  [ - ] [ - ] [ 12] [ - ]  ...  [ 9 ]
/// ```
///
/// Allocated once; indices are stable for the life of the engine.
pub(crate) struct ShardTable {
    slots: Box<[ShardSlot]>,
}

impl ShardTable {
    pub(crate) fn new(num_shards: usize) -> Self {
        let slots = (0..num_shards).map(|_| ShardSlot::new()).collect();
        Self { slots }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Map a conflict hash to its shard: `hash mod N`.
    pub(crate) fn index(&self, hash: u64) -> ShardIndex {
        (hash % self.slots.len() as u64) as ShardIndex
    }

    /// Sequence id of the last commit that touched this shard.
    pub(crate) fn seq_id(&self, shard: ShardIndex) -> SeqId {
        self.slots[shard].seq_id.load(Ordering::Acquire)
    }

    pub(crate) fn owner(&self, shard: ShardIndex) -> TxnId {
        self.slots[shard].owner.load(Ordering::Acquire)
    }

    /// Claim an unowned shard for `id`.
    ///
    /// On failure returns the transaction currently holding it. A
    /// successful claim synchronizes with the release that freed the slot,
    /// so a following `seq_id` load sees that releaser's publish.
    pub(crate) fn try_claim(&self, shard: ShardIndex, id: TxnId) -> Result<(), TxnId> {
        self.slots[shard]
            .owner
            .compare_exchange(NO_OWNER, id, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    /// Drop `id`'s claim. Returns false if `id` didn't hold it.
    pub(crate) fn release(&self, shard: ShardIndex, id: TxnId) -> bool {
        self.slots[shard]
            .owner
            .compare_exchange(id, NO_OWNER, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Stamp the shard with a commit sequence id and drop `id`'s claim.
    ///
    /// Caller must hold the commit lock.
    pub(crate) fn publish(&self, shard: ShardIndex, seq: SeqId, id: TxnId) -> bool {
        self.slots[shard].seq_id.store(seq, Ordering::Release);
        self.release(shard, id)
    }
}

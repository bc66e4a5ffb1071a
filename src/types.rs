/// Commit sequence number. Totally ordered by the engine's commit lock.
pub type SeqId = u64;

/// Unique transaction identifier handed out by the engine.
pub type TxnId = u64;

/// Index of a slot in the conflict table.
pub type ShardIndex = usize;

/// Owner value of a slot nobody has claimed.
///
/// Transaction ids start at 1, so a live transaction can never look like
/// an empty slot.
pub const NO_OWNER: TxnId = 0;

/// Snapshot of a transaction that has not recorded one yet.
///
/// Every committed sequence number is <= this value, so a transaction with
/// no snapshot "sees everything" and only ownership conflicts apply.
pub const UNSET_SNAPSHOT: SeqId = SeqId::MAX;

/// Lifecycle of a transaction handle.
///
/// ```text
/// Created ──► SnapshotTaken ──► Committed
///    │              │
///    └──────────────┴─────────► Aborted
/// ```
///
/// `Committed` and `Aborted` are terminal. Moving out of either is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Handle exists, no snapshot boundary recorded.
    Created,
    /// Snapshot boundary recorded; writes may be registered.
    SnapshotTaken,
    /// Writes published at a commit sequence number.
    Committed,
    /// Claims released without publishing.
    Aborted,
}

impl TxnState {
    /// Whether the handle has reached commit or abort.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

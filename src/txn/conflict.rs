use std::fmt;

use crate::types::{SeqId, ShardIndex, TxnId};

/// Why a write registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Another transaction committed to the shard after our snapshot.
    StaleSnapshot { committed_seq_id: SeqId },
    /// Another live transaction holds an uncommitted claim on the shard.
    Claimed { owner: TxnId },
    /// This transaction already committed or aborted.
    Finished,
}

/// A refused write registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub shard: ShardIndex,
    pub kind: ConflictKind,
}

impl Conflict {
    /// Stale and claimed conflicts clear up with a new snapshot (or once the
    /// owner finishes). Writing through a finished handle never does.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, ConflictKind::Finished)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConflictKind::StaleSnapshot { committed_seq_id } => write!(
                f,
                "shard {} committed at seq {} after snapshot",
                self.shard, committed_seq_id
            ),
            ConflictKind::Claimed { owner } => {
                write!(f, "shard {} claimed by txn {}", self.shard, owner)
            }
            ConflictKind::Finished => {
                write!(f, "shard {}: transaction already finished", self.shard)
            }
        }
    }
}

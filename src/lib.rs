//! # Transaction Write-Conflict Engine
//!
//! Optimistic write-conflict detection for snapshot-isolated, multi-statement
//! transactions layered on a storage engine that only guarantees atomic
//! single write batches.
//!
//! ## Core idea
//! Every write's key is hashed onto one slot of a fixed-size shard table.
//! Each slot remembers the sequence id of the last commit that touched it
//! and which live transaction currently claims it. A write conflicts if its
//! shard was committed after the writer's snapshot, or is claimed by someone
//! else. Commits are serialized by one lock that hands out the global commit
//! sequence.
//!
//! Aliasing keys onto shards can cause spurious conflicts, never missed ones.

pub mod engine;
pub mod error;
pub mod hash;
pub mod options;
pub mod txn;
pub mod types;

// Public re-exports for the top-level API
pub use engine::{ConflictEngine, EngineStats};
pub use error::{Error, Result};
pub use hash::{conflict_key, conflict_key_with_seed};
pub use options::Options;
pub use txn::Transaction;
pub use txn::conflict::{Conflict, ConflictKind};
pub use types::{SeqId, ShardIndex, TxnId, TxnState};

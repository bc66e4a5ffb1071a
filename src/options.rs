use crate::error::{Error, Result};

/// Default number of conflict table shards (2^20).
///
/// Two slots of 8 bytes each per shard: 16 MiB per engine.
pub const DEFAULT_NUM_SHARDS: usize = 1 << 20;

/// Configuration for a [`ConflictEngine`](crate::ConflictEngine).
///
/// Sizing trade-off:
///   - more shards: fewer unrelated keys aliasing, fewer spurious aborts
///   - fewer shards: less memory, more false-positive conflicts
///
/// Aliasing never hides a real conflict, so any size is correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Number of slots in the conflict table. Fixed for the engine's lifetime.
    pub num_shards: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_shards: DEFAULT_NUM_SHARDS,
        }
    }
}

impl Options {
    /// Options with the given shard count and defaults for everything else.
    pub fn with_shards(num_shards: usize) -> Self {
        Self { num_shards }
    }

    /// Check the options before building an engine from them.
    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(Error::InvalidOptions("num_shards must be > 0".into()));
        }
        Ok(())
    }
}

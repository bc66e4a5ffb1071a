use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

/// Reduce a record key to the 64-bit conflict key used by
/// [`Transaction::register_write`](crate::Transaction::register_write).
///
/// The engine takes `hash mod num_shards`, so the low bits must be well
/// mixed. xxh3 gives that for arbitrary byte keys, including short
/// integer-encoded ones.
pub fn conflict_key(key: &[u8]) -> u64 {
    xxh3_64(key)
}

/// Like [`conflict_key`], but salted with a namespace id (a table or
/// collection prefix) so equal keys in different namespaces land on
/// different shards.
pub fn conflict_key_with_seed(key: &[u8], namespace: u64) -> u64 {
    xxh3_64_with_seed(key, namespace)
}

//! Construction errors.

use thiserror::Error;

use super::MAX_SHARD_COUNT;

/// Rejected shard count passed to [`ShardedMap::try_with_shards`](super::ShardedMap::try_with_shards).
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ShardCountError {
    /// Routing masks the hash with `shard_count - 1`, which only works for powers of two.
    #[error("shard count must be a power of two, got {0}")]
    NotPowerOfTwo(usize),

    /// The hash is 32 bits wide, so shards beyond `MAX_SHARD_COUNT` are unreachable.
    #[error("shard count {0} exceeds the maximum of {max}", max = MAX_SHARD_COUNT)]
    TooLarge(usize),
}

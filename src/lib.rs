#![deny(missing_docs, clippy::all)]
#![warn(clippy::pedantic)]

//! Concurrent string-keyed map partitioned into independently locked shards.
//!
//! # sharded_map::ShardedMap
//! A fixed number of `RwLock`-protected shards; every key is routed to exactly one shard by
//! [`polynomial_hash`]. Whole-map operations visit shards one at a time and are weakly
//! consistent.
//!
//! ## Cargo features
//!
//! * `serde`: `Serialize` and `Deserialize` for [`ShardedMap`].
//! * `loom`: replaces the shard lock with the `loom` lock for model checking.

mod error;
pub use error::ShardCountError;

mod hash;
pub use hash::{polynomial_hash, HASH_SEED};

mod sharded_map;
pub use sharded_map::{Items, Keys, ShardedMap, DEFAULT_SHARD_COUNT, MAX_SHARD_COUNT};

mod shard;
mod sync;

#[cfg(feature = "serde")]
mod serde;

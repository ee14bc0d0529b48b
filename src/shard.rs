//! [`Shard`] is one independently locked partition of a [`ShardedMap`](super::ShardedMap).

use std::collections::HashMap;
use std::mem::take;

use super::sync::RwLock;

/// Lock-protected storage for the keys routed to a single shard.
///
/// Every access to `entries` happens under its lock; shared for lookups and snapshots, exclusive
/// for anything that changes the key set. A [`Shard`] knows nothing about its siblings.
///
/// Shared locks are always taken with `read_recursive`: a lookup issued from inside a `read`
/// callback must not queue behind a waiting writer that is itself waiting for the callback.
///
/// Shards are aligned to 128 bytes so that two adjacent locks never share a cache line.
#[repr(align(128))]
pub(crate) struct Shard<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Shard<V> {
    /// Creates an empty [`Shard`].
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Passes a reference to the value associated with the key to `reader`.
    #[inline]
    pub(crate) fn read<R, F: FnOnce(&str, &V) -> R>(&self, key: &str, reader: F) -> Option<R> {
        let entries = self.entries.read_recursive();
        entries
            .get_key_value(key)
            .map(|(k, v)| reader(k.as_str(), v))
    }

    #[inline]
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.read_recursive().contains_key(key)
    }

    /// Inserts or overwrites the value associated with the key.
    #[inline]
    pub(crate) fn set(&self, key: String, value: V) {
        // The replaced value is dropped outside the lock.
        let replaced = self.entries.write().insert(key, value);
        drop(replaced);
    }

    /// Removes the key if present.
    #[inline]
    pub(crate) fn delete(&self, key: &str) {
        let removed = self.entries.write().remove(key);
        drop(removed);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.read_recursive().len()
    }

    /// Replaces the storage with an empty map and returns the number of entries it held.
    ///
    /// The detached entries are dropped after the lock is released.
    pub(crate) fn flush_and_count(&self) -> usize {
        let detached = take(&mut *self.entries.write());
        detached.len()
    }

    /// Removes an arbitrary entry.
    ///
    /// The entry is the first one found by scanning the table from its first slot, so emptying a
    /// shard this way is quadratic in the number of entries.
    pub(crate) fn take_one(&self) -> Option<(String, V)> {
        let mut entries = self.entries.write();
        let key = entries.keys().next()?.clone();
        entries.remove_entry(&key)
    }

    /// Copies all the keys out of the shard.
    pub(crate) fn snapshot_keys(&self) -> Vec<String> {
        self.entries.read_recursive().keys().cloned().collect()
    }

    /// Acquires the exclusive lock and holds it until the returned guard is dropped.
    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn lock_exclusive(&self) -> impl Sized + '_ {
        self.entries.write()
    }
}

impl<V: Clone> Shard<V> {
    #[inline]
    pub(crate) fn get(&self, key: &str) -> Option<V> {
        self.entries.read_recursive().get(key).cloned()
    }

    /// Copies all the entries out of the shard.
    pub(crate) fn snapshot_entries(&self) -> Vec<(String, V)> {
        self.entries
            .read_recursive()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

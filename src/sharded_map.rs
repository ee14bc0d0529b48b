//! [`ShardedMap`] is a concurrent string-keyed map split into independently locked shards.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::iter::FusedIterator;
use std::vec;

use tracing::{debug, trace};

use super::error::ShardCountError;
use super::hash::polynomial_hash;
use super::shard::Shard;

/// Number of shards created by [`ShardedMap::new`].
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Largest shard count accepted by [`ShardedMap::try_with_shards`].
///
/// Shard indexes are derived from a 32-bit hash, so larger counts would leave shards unreachable.
pub const MAX_SHARD_COUNT: usize = 1 << 31;

/// Concurrent map from `String` keys to values of an arbitrary type.
///
/// [`ShardedMap`] owns a fixed number of shards, each of which is a [`HashMap`] protected by its
/// own read-write lock. A key is routed to exactly one shard by
/// `polynomial_hash(key) & (shard_count - 1)`, and the shard count never changes, therefore a key
/// never migrates between shards.
///
/// ## Locking behavior
///
/// ### Single-key operations
///
/// [`get`](Self::get), [`read`](Self::read) and [`has`](Self::has) acquire the shared lock of the
/// target shard; [`set`](Self::set) and [`delete`](Self::delete) acquire its exclusive lock. The
/// lock is held only for the in-memory operation itself. Operations on keys in different shards
/// never contend, and operations on the same key are linearizable.
///
/// ### Whole-map operations
///
/// [`size`](Self::size), [`flush`](Self::flush), [`pop`](Self::pop), the `for_each` methods and
/// the iterators visit the shards one by one, releasing the lock of a shard before acquiring the
/// next one. No two shard locks are ever held at the same time, so there is no lock ordering to
/// get wrong. The price is weak consistency: the result is assembled from per-shard views taken
/// at different instants, and may mix states before and after a concurrent modification.
///
/// ### Callbacks
///
/// Visitors and iterator consumers only ever see a copy of a shard taken under its lock. The lock
/// is released before the first element of the copy is handed out, so it is safe to modify the
/// [`ShardedMap`] while iterating over it.
pub struct ShardedMap<V> {
    shards: Box<[Shard<V>]>,
}

/// An iterator over the keys of a [`ShardedMap`].
///
/// Created by [`ShardedMap::iter_keys`].
pub struct Keys<'m, V> {
    map: &'m ShardedMap<V>,
    next_shard: usize,
    pending: vec::IntoIter<String>,
}

/// An iterator over the entries of a [`ShardedMap`].
///
/// Created by [`ShardedMap::iter_items`].
pub struct Items<'m, V> {
    map: &'m ShardedMap<V>,
    next_shard: usize,
    pending: vec::IntoIter<(String, V)>,
}

impl<V> ShardedMap<V> {
    /// Creates an empty [`ShardedMap`] with [`DEFAULT_SHARD_COUNT`] shards.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// assert_eq!(map.shard_count(), 32);
    /// assert_eq!(map.size(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    /// Creates an empty [`ShardedMap`] with the specified number of shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is not a power of two or is greater than [`MAX_SHARD_COUNT`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::with_shards(64);
    /// assert_eq!(map.shard_count(), 64);
    /// ```
    #[inline]
    #[must_use]
    pub fn with_shards(shard_count: usize) -> Self {
        match Self::try_with_shards(shard_count) {
            Ok(map) => map,
            Err(error) => panic!("{error}"),
        }
    }

    /// Creates an empty [`ShardedMap`] with the specified number of shards.
    ///
    /// # Errors
    ///
    /// Returns an error if `shard_count` is not a power of two or is greater than
    /// [`MAX_SHARD_COUNT`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::{ShardCountError, ShardedMap};
    ///
    /// assert!(ShardedMap::<u32>::try_with_shards(16).is_ok());
    /// assert_eq!(
    ///     ShardedMap::<u32>::try_with_shards(24).err(),
    ///     Some(ShardCountError::NotPowerOfTwo(24))
    /// );
    /// ```
    pub fn try_with_shards(shard_count: usize) -> Result<Self, ShardCountError> {
        if !shard_count.is_power_of_two() {
            return Err(ShardCountError::NotPowerOfTwo(shard_count));
        }
        if shard_count > MAX_SHARD_COUNT {
            return Err(ShardCountError::TooLarge(shard_count));
        }
        trace!(shard_count, "creating sharded map");
        Ok(Self {
            shards: (0..shard_count).map(|_| Shard::new()).collect(),
        })
    }

    /// Returns the number of shards.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::with_shards(16);
    /// map.set("one", 1);
    /// assert_eq!(map.shard_count(), 16);
    /// assert_eq!(map.flush(), 1);
    /// assert_eq!(map.shard_count(), 16);
    /// ```
    #[inline]
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the index of the shard that owns the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::{polynomial_hash, ShardedMap};
    ///
    /// let map: ShardedMap<u32> = ShardedMap::with_shards(8);
    /// assert_eq!(map.shard_index("one"), (polynomial_hash("one") & 7) as usize);
    /// ```
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    #[must_use]
    pub fn shard_index(&self, key: &str) -> usize {
        // Lossless: the shard count never exceeds `MAX_SHARD_COUNT`.
        let mask = (self.shards.len() - 1) as u32;
        (polynomial_hash(key) & mask) as usize
    }

    /// Inserts a key-value pair, overwriting the value if the key is already present.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    ///
    /// map.set("one", 1);
    /// map.set("one", 11);
    /// assert_eq!(map.get("one"), Some(11));
    /// ```
    #[inline]
    pub fn set<K: Into<String>>(&self, key: K, value: V) {
        let key = key.into();
        self.locate(&key).set(key, value);
    }

    /// Removes the key from the [`ShardedMap`].
    ///
    /// Removing an absent key does nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    ///
    /// map.set("one", 1);
    /// map.delete("one");
    /// map.delete("one");
    /// assert!(!map.has("one"));
    /// ```
    #[inline]
    pub fn delete(&self, key: &str) {
        self.locate(key).delete(key);
    }

    /// Checks if the key exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    ///
    /// assert!(!map.has("one"));
    /// map.set("one", 1);
    /// assert!(map.has("one"));
    /// ```
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.locate(key).contains(key)
    }

    /// Reads the entry associated with the key without cloning the value.
    ///
    /// The shared lock of the shard is held while `reader` runs. `reader` may look up the
    /// [`ShardedMap`], including keys in the same shard, but must not modify it: a `set`, `delete`,
    /// `pop` or `flush` reaching the locked shard waits for `reader` forever.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<Vec<u8>> = ShardedMap::new();
    ///
    /// map.set("blob", vec![0; 64]);
    /// assert_eq!(map.read("blob", |_, v| v.len()), Some(64));
    /// assert!(map.read("missing", |_, v| v.len()).is_none());
    /// ```
    #[inline]
    pub fn read<R, F: FnOnce(&str, &V) -> R>(&self, key: &str, reader: F) -> Option<R> {
        self.locate(key).read(key, reader)
    }

    /// Returns the number of entries.
    ///
    /// The per-shard counts are read one shard at a time, so the sum is only a best-effort figure
    /// while other threads modify the [`ShardedMap`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    ///
    /// map.set("one", 1);
    /// map.set("two", 2);
    /// assert_eq!(map.size(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Returns `true` if no shard holds an entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// assert!(map.is_empty());
    ///
    /// map.set("one", 1);
    /// assert!(!map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.len() == 0)
    }

    /// Removes all the entries and returns how many there were.
    ///
    /// Shards are cleared one after another; entries inserted into an already cleared shard
    /// during the call survive it.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::with_shards(64);
    ///
    /// for i in 0..42 {
    ///     map.set(i.to_string(), i);
    /// }
    /// assert_eq!(map.flush(), 42);
    /// assert_eq!(map.size(), 0);
    /// assert_eq!(map.shard_count(), 64);
    /// ```
    pub fn flush(&self) -> usize {
        let removed: usize = self.shards.iter().map(Shard::flush_and_count).sum();
        debug!(removed, shard_count = self.shards.len(), "flushed sharded map");
        removed
    }

    /// Removes and returns an arbitrary entry.
    ///
    /// Shards are tried in order and the first one holding an entry gives one up. Returns `None`
    /// if every shard was empty at the time it was visited.
    ///
    /// Each call scans the chosen shard's table from its first slot, so draining a large map with
    /// repeated `pop` calls costs time quadratic in the size of a shard. Use
    /// [`flush`](Self::flush), or [`iter_keys`](Self::iter_keys) followed by
    /// [`delete`](Self::delete), to empty a large map.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// assert!(map.pop().is_none());
    ///
    /// map.set("one", 1);
    /// assert_eq!(map.pop(), Some(("one".to_string(), 1)));
    /// assert_eq!(map.size(), 0);
    /// ```
    pub fn pop(&self) -> Option<(String, V)> {
        let popped = self
            .shards
            .iter()
            .filter(|shard| shard.len() != 0)
            .find_map(Shard::take_one);
        if popped.is_none() {
            trace!("pop found no entry");
        }
        popped
    }

    /// Calls `visit` with every key until it returns `false`.
    ///
    /// The keys of a shard are copied before `visit` is called, so `visit` may freely access the
    /// [`ShardedMap`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// for i in 0..8 {
    ///     map.set(i.to_string(), i);
    /// }
    ///
    /// let mut visited = 0;
    /// map.for_each_key(|key| {
    ///     map.delete(key);
    ///     visited += 1;
    ///     visited < 3
    /// });
    /// assert_eq!(visited, 3);
    /// assert_eq!(map.size(), 5);
    /// ```
    #[inline]
    pub fn for_each_key<F: FnMut(&str) -> bool>(&self, mut visit: F) {
        for key in self.iter_keys() {
            if !visit(&key) {
                break;
            }
        }
    }

    /// Returns an iterator over the keys.
    ///
    /// A shard is copied when the iterator reaches it, and its lock is released before any of
    /// its keys are returned. Dropping the iterator early holds no lock and leaves nothing
    /// running.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// map.set("one", 1);
    /// map.set("two", 2);
    ///
    /// let mut keys: Vec<String> = map.iter_keys().collect();
    /// keys.sort();
    /// assert_eq!(keys, ["one", "two"]);
    /// ```
    #[inline]
    #[must_use]
    pub fn iter_keys(&self) -> Keys<'_, V> {
        Keys {
            map: self,
            next_shard: 0,
            pending: Vec::new().into_iter(),
        }
    }

    /// Finds the shard that owns the key.
    #[inline]
    fn locate(&self, key: &str) -> &Shard<V> {
        &self.shards[self.shard_index(key)]
    }

    #[cfg(all(test, not(feature = "loom")))]
    pub(crate) fn shard(&self, index: usize) -> &Shard<V> {
        &self.shards[index]
    }
}

impl<V: Clone> ShardedMap<V> {
    /// Returns a clone of the value associated with the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    ///
    /// assert!(map.get("one").is_none());
    /// map.set("one", 1);
    /// assert_eq!(map.get("one"), Some(1));
    /// ```
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.locate(key).get(key)
    }

    /// Calls `visit` with every entry until it returns `false`.
    ///
    /// The entries of a shard are copied before `visit` is called, so `visit` may freely access
    /// the [`ShardedMap`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// for i in 0..8 {
    ///     map.set(i.to_string(), i);
    /// }
    ///
    /// let mut sum = 0;
    /// map.for_each_item(|key, value| {
    ///     map.set(key, value * 10);
    ///     sum += value;
    ///     true
    /// });
    /// assert_eq!(sum, 28);
    /// assert_eq!(map.get("7"), Some(70));
    /// ```
    #[inline]
    pub fn for_each_item<F: FnMut(&str, &V) -> bool>(&self, mut visit: F) {
        for (key, value) in self.iter_items() {
            if !visit(&key, &value) {
                break;
            }
        }
    }

    /// Returns an iterator over the entries.
    ///
    /// A shard is copied when the iterator reaches it, and its lock is released before any of
    /// its entries are returned. Dropping the iterator early holds no lock and leaves nothing
    /// running.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// map.set("one", 1);
    ///
    /// for (key, value) in map.iter_items() {
    ///     map.set(key, value + 1);
    /// }
    /// assert_eq!(map.get("one"), Some(2));
    /// ```
    #[inline]
    #[must_use]
    pub fn iter_items(&self) -> Items<'_, V> {
        Items {
            map: self,
            next_shard: 0,
            pending: Vec::new().into_iter(),
        }
    }

    /// Collects the entries into a plain [`HashMap`].
    ///
    /// This is the form handed to encoders; the [`ShardedMap`] itself does not know about any
    /// encoding. The result is assembled from per-shard copies and is only a weakly consistent
    /// view of the map under concurrent modification.
    ///
    /// # Examples
    ///
    /// ```
    /// use sharded_map::ShardedMap;
    ///
    /// let map: ShardedMap<u32> = ShardedMap::new();
    /// map.set("one", 1);
    ///
    /// let snapshot = map.to_map();
    /// assert_eq!(snapshot.get("one"), Some(&1));
    /// ```
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, V> {
        self.iter_items().collect()
    }
}

impl<V: Clone> Clone for ShardedMap<V> {
    /// Copies the entries into a new [`ShardedMap`] with the same number of shards.
    #[inline]
    fn clone(&self) -> Self {
        let cloned = Self::with_shards(self.shard_count());
        for (key, value) in self.iter_items() {
            cloned.set(key, value);
        }
        cloned
    }
}

impl<V: Clone + Debug> Debug for ShardedMap<V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_items()).finish()
    }
}

impl<V> Default for ShardedMap<V> {
    /// Creates an empty [`ShardedMap`] with [`DEFAULT_SHARD_COUNT`] shards.
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Extend<(String, V)> for ShardedMap<V> {
    #[inline]
    fn extend<T: IntoIterator<Item = (String, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<V> FromIterator<(String, V)> for ShardedMap<V> {
    #[inline]
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'m, V: Clone> IntoIterator for &'m ShardedMap<V> {
    type Item = (String, V);
    type IntoIter = Items<'m, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_items()
    }
}

impl<V: Clone + PartialEq> PartialEq for ShardedMap<V> {
    /// Compares snapshots of the two maps; the shard counts are irrelevant.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

impl<V> Debug for Keys<'_, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("next_shard", &self.next_shard)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<V> Iterator for Keys<'_, V> {
    type Item = String;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.pending.next() {
                return Some(key);
            }
            let shard = self.map.shards.get(self.next_shard)?;
            self.next_shard += 1;
            self.pending = shard.snapshot_keys().into_iter();
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), None)
    }
}

impl<V> FusedIterator for Keys<'_, V> {}

impl<V> Debug for Items<'_, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Items")
            .field("next_shard", &self.next_shard)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<V: Clone> Iterator for Items<'_, V> {
    type Item = (String, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.next() {
                return Some(entry);
            }
            let shard = self.map.shards.get(self.next_shard)?;
            self.next_shard += 1;
            self.pending = shard.snapshot_entries().into_iter();
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), None)
    }
}

impl<V: Clone> FusedIterator for Items<'_, V> {}

//! Compact open-addressing hash table with overflow chaining.
//!
//! [`SlimHashTable`] stores entries in one flat array; a prime-sized slot
//! array maps `hash % slots` to the head of a collision chain threaded
//! through `next` indices in the entry array. Removed entries recycle
//! through a freelist in the same array, so memory is reused before the
//! table grows.
//!
//! The table itself is unsynchronized; callers needing shared access wrap it
//! in [`ConcurrentHashSet`], which serializes every operation behind one
//! exclusive lock.

use std::hash::{BuildHasher, Hash};

use fnv::FnvBuildHasher;
use parking_lot::Mutex;

/// Default number of values the table can hold before growing.
const DEFAULT_CAPACITY: usize = 31;

/// Default ratio of stored entries to hash slots.
const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Smallest load factor the table accepts; anything lower wastes slots to
/// the point of being a caller bug.
const MIN_LOAD_FACTOR: f64 = 0.1;

/// Primes used for slot-array sizes, spaced roughly 2x apart.
const PRIMES: &[usize] = &[
    3, 7, 17, 37, 79, 163, 331, 673, 1361, 2729, 5471, 10_949, 21_911, 43_853, 87_719, 175_447,
    350_899, 701_819, 1_403_641, 2_807_303, 5_614_657, 11_229_331, 22_458_671, 44_917_381,
    89_834_777, 179_669_557, 359_339_171, 718_678_369, 1_437_356_741,
];

/// Returns the smallest tabled prime >= `min`.
fn next_prime(min: usize) -> usize {
    PRIMES
        .iter()
        .copied()
        .find(|&p| p >= min)
        .unwrap_or_else(|| PRIMES[PRIMES.len() - 1])
}

/// One slot of the entry array: either a live key/value pair with its
/// chain link, or a freelist link to the next recycled slot.
#[derive(Debug)]
enum Entry<K, V> {
    Occupied {
        /// Cached hash of `key`; compared before key equality on lookups.
        hash: u64,
        key: K,
        value: V,
        /// Next entry in this slot's collision chain.
        next: Option<usize>,
    },
    Free {
        /// Next entry in the freelist.
        next_free: Option<usize>,
    },
}

/// Open-addressing hash table with a fixed slot array, a secondary entry
/// array, and a freelist of removed entries.
///
/// `insert` treats a duplicate key as a programmer error and panics; callers
/// needing insert-or-fetch semantics use
/// [`get_or_insert_with`](Self::get_or_insert_with).
pub struct SlimHashTable<K, V, S = FnvBuildHasher> {
    /// `hash % slots.len()` maps to the head entry of a collision chain.
    slots: Vec<Option<usize>>,
    entries: Vec<Entry<K, V>>,
    /// Capacity target: the table grows once `count` reaches this.
    capacity: usize,
    load_factor: f64,
    /// Number of live (occupied) entries.
    count: usize,
    /// Head of the freelist of recycled entry indices.
    free_head: Option<usize>,
    hasher: S,
}

impl<K: Hash + Eq, V> SlimHashTable<K, V> {
    /// Creates a table with default capacity and load factor.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a table pre-sized for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// Creates a table pre-sized for `capacity` values at the given load
    /// factor.
    ///
    /// # Panics
    /// Panics if `load_factor` is below 0.1 or not finite.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f64) -> Self {
        assert!(
            load_factor.is_finite() && load_factor >= MIN_LOAD_FACTOR,
            "invalid load factor: {load_factor}"
        );
        let capacity = capacity.max(1);
        let slot_count = next_prime((capacity as f64 / load_factor).ceil() as usize);
        Self {
            slots: vec![None; slot_count],
            entries: Vec::with_capacity(capacity),
            capacity,
            load_factor,
            count: 0,
            free_head: None,
            hasher: FnvBuildHasher::default(),
        }
    }
}

impl<K: Hash + Eq, V> Default for SlimHashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> SlimHashTable<K, V, S> {
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn hash_of(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    fn slot_of(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    /// Finds the entry index holding `key`, if present.
    fn find(&self, key: &K) -> Option<usize> {
        let hash = self.hash_of(key);
        let mut cursor = self.slots[self.slot_of(hash)];
        while let Some(index) = cursor {
            match &self.entries[index] {
                Entry::Occupied {
                    hash: entry_hash,
                    key: entry_key,
                    next,
                    ..
                } => {
                    if *entry_hash == hash && entry_key == key {
                        return Some(index);
                    }
                    cursor = *next;
                }
                Entry::Free { .. } => {
                    unreachable!("freelist entry reachable from a slot chain")
                }
            }
        }
        None
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|index| match &self.entries[index] {
            Entry::Occupied { value, .. } => value,
            Entry::Free { .. } => unreachable!(),
        })
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.find(key)?;
        match &mut self.entries[index] {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Free { .. } => unreachable!(),
        }
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Inserts a new key/value pair.
    ///
    /// # Panics
    /// Panics if `key` is already present. Use
    /// [`insert_or_update`](Self::insert_or_update) or
    /// [`get_or_insert_with`](Self::get_or_insert_with) when the key may
    /// exist.
    pub fn insert(&mut self, key: K, value: V) {
        assert!(
            self.find(&key).is_none(),
            "duplicate key inserted into SlimHashTable"
        );
        self.insert_new(key, value);
    }

    /// Inserts `value` under `key`, replacing any existing value.
    /// Returns the previous value if the key was present.
    pub fn insert_or_update(&mut self, key: K, value: V) -> Option<V> {
        if let Some(index) = self.find(&key) {
            match &mut self.entries[index] {
                Entry::Occupied { value: slot, .. } => {
                    return Some(std::mem::replace(slot, value));
                }
                Entry::Free { .. } => unreachable!(),
            }
        }
        self.insert_new(key, value);
        None
    }

    /// Returns the value under `key`, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &V {
        let index = match self.find(&key) {
            Some(index) => index,
            None => self.insert_new(key, make()),
        };
        match &self.entries[index] {
            Entry::Occupied { value, .. } => value,
            Entry::Free { .. } => unreachable!(),
        }
    }

    /// Removes `key`, returning its value if it was present. The entry slot
    /// is recycled through the freelist.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = self.hash_of(key);
        let slot = self.slot_of(hash);

        let mut previous: Option<usize> = None;
        let mut cursor = self.slots[slot];
        while let Some(index) = cursor {
            let (matches, next) = match &self.entries[index] {
                Entry::Occupied {
                    hash: entry_hash,
                    key: entry_key,
                    next,
                    ..
                } => (*entry_hash == hash && entry_key == key, *next),
                Entry::Free { .. } => {
                    unreachable!("freelist entry reachable from a slot chain")
                }
            };
            if matches {
                // Unlink from the chain, then thread onto the freelist.
                match previous {
                    Some(prev_index) => match &mut self.entries[prev_index] {
                        Entry::Occupied { next: prev_next, .. } => *prev_next = next,
                        Entry::Free { .. } => unreachable!(),
                    },
                    None => self.slots[slot] = next,
                }
                let removed = std::mem::replace(
                    &mut self.entries[index],
                    Entry::Free {
                        next_free: self.free_head,
                    },
                );
                self.free_head = Some(index);
                self.count -= 1;
                match removed {
                    Entry::Occupied { value, .. } => return Some(value),
                    Entry::Free { .. } => unreachable!(),
                }
            }
            previous = Some(index);
            cursor = next;
        }
        None
    }

    /// Drops all entries, keeping allocated storage.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.entries.clear();
        self.count = 0;
        self.free_head = None;
    }

    /// Iterates over live entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Occupied { key, value, .. } => Some((key, value)),
            Entry::Free { .. } => None,
        })
    }

    /// Core insertion: the key must not be present. Returns the entry index.
    fn insert_new(&mut self, key: K, value: V) -> usize {
        if self.count >= self.capacity && self.free_head.is_none() {
            self.grow();
        }
        let hash = self.hash_of(&key);
        let slot = self.slot_of(hash);
        let entry = Entry::Occupied {
            hash,
            key,
            value,
            next: self.slots[slot],
        };
        let index = match self.free_head {
            Some(free_index) => {
                self.free_head = match &self.entries[free_index] {
                    Entry::Free { next_free } => *next_free,
                    Entry::Occupied { .. } => unreachable!("occupied entry on the freelist"),
                };
                self.entries[free_index] = entry;
                free_index
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        self.slots[slot] = Some(index);
        self.count += 1;
        index
    }

    /// Doubles capacity to the next prime and rehashes every live entry
    /// into the new slot array. Chain order is not preserved.
    fn grow(&mut self) {
        self.capacity = next_prime(self.capacity.saturating_mul(2));
        let slot_count = next_prime((self.capacity as f64 / self.load_factor).ceil() as usize);
        self.slots = vec![None; slot_count];
        self.entries.reserve(self.capacity - self.entries.len());
        for index in 0..self.entries.len() {
            if let Entry::Occupied { hash, next, .. } = &mut self.entries[index] {
                let slot = (*hash % slot_count as u64) as usize;
                *next = self.slots[slot];
                self.slots[slot] = Some(index);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Concurrent wrapper
// ---------------------------------------------------------------------------

/// A set of values deduplicated by equality, safe for shared use.
///
/// One exclusive lock serializes every operation; `get_or_add` is therefore
/// atomic: concurrent callers adding equal values all receive the same
/// canonical instance.
pub struct ConcurrentHashSet<T: Hash + Eq + Clone> {
    inner: Mutex<SlimHashTable<T, T>>,
}

impl<T: Hash + Eq + Clone> ConcurrentHashSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlimHashTable::new()),
        }
    }

    /// Returns the canonical instance equal to `value`, inserting `value`
    /// itself if no equal instance exists yet.
    pub fn get_or_add(&self, value: T) -> T {
        let mut table = self.inner.lock();
        table
            .get_or_insert_with(value.clone(), move || value)
            .clone()
    }

    /// Returns true if an instance equal to `value` is present.
    pub fn contains(&self, value: &T) -> bool {
        self.inner.lock().contains_key(value)
    }

    /// Number of distinct values held.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<T: Hash + Eq + Clone> Default for ConcurrentHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut table = SlimHashTable::new();
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&"a"), Some(&1));
        assert_eq!(table.get(&"b"), Some(&2));
        assert_eq!(table.get(&"c"), None);
        assert!(table.contains_key(&"a"));
        assert!(!table.contains_key(&"c"));
    }

    #[test]
    #[should_panic(expected = "duplicate key")]
    fn duplicate_insert_panics() {
        let mut table = SlimHashTable::new();
        table.insert("a", 1);
        table.insert("a", 2);
    }

    #[test]
    fn insert_or_update_replaces() {
        let mut table = SlimHashTable::new();
        assert_eq!(table.insert_or_update("a", 1), None);
        assert_eq!(table.insert_or_update("a", 2), Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"a"), Some(&2));
    }

    #[test]
    fn get_or_insert_with_returns_existing() {
        let mut table = SlimHashTable::new();
        table.insert("a", 1);
        assert_eq!(*table.get_or_insert_with("a", || 99), 1);
        assert_eq!(*table.get_or_insert_with("b", || 2), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn remove_recycles_entries() {
        let mut table = SlimHashTable::new();
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.remove(&"a"), Some(1));
        assert_eq!(table.remove(&"a"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"a"), None);
        assert_eq!(table.get(&"b"), Some(&2));

        // Freed slot is reused for the next insertion.
        table.insert("c", 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&"c"), Some(&3));
    }

    #[test]
    fn count_tracks_live_entries() {
        let mut table = SlimHashTable::new();
        for i in 0..100 {
            table.insert(i, i * 2);
        }
        for i in (0..100).step_by(2) {
            table.remove(&i);
        }
        assert_eq!(table.len(), 50);
        assert_eq!(table.iter().count(), 50);
        for i in 0..100 {
            assert_eq!(table.contains_key(&i), i % 2 == 1, "key {i}");
        }
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut table = SlimHashTable::with_capacity(4);
        for i in 0..10_000 {
            table.insert(i, i);
        }
        assert_eq!(table.len(), 10_000);
        for i in 0..10_000 {
            assert_eq!(table.get(&i), Some(&i));
        }
    }

    #[test]
    fn chains_survive_collisions() {
        // Tiny capacity forces every key through a handful of slots.
        let mut table = SlimHashTable::with_capacity_and_load_factor(1, 0.1);
        for i in 0..64 {
            table.insert(i, i);
        }
        for i in 0..64 {
            assert_eq!(table.get(&i), Some(&i));
        }
        for i in 0..64 {
            assert_eq!(table.remove(&i), Some(i));
        }
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid load factor")]
    fn rejects_tiny_load_factor() {
        let _: SlimHashTable<u32, u32> = SlimHashTable::with_capacity_and_load_factor(16, 0.05);
    }

    #[test]
    fn clear_keeps_table_usable() {
        let mut table = SlimHashTable::new();
        table.insert("a", 1);
        table.clear();
        assert!(table.is_empty());
        table.insert("a", 2);
        assert_eq!(table.get(&"a"), Some(&2));
    }

    #[test]
    fn concurrent_set_returns_canonical_instance() {
        use std::sync::Arc;

        let set = ConcurrentHashSet::new();
        let first = set.get_or_add(Arc::new(String::from("hello")));
        let second = set.get_or_add(Arc::new(String::from("hello")));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn concurrent_set_under_contention() {
        use std::sync::Arc;

        let set = Arc::new(ConcurrentHashSet::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        set.get_or_add(i % 50);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert_eq!(set.len(), 50);
    }
}

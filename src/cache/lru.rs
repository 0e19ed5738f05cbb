//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction across all namespaces.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == LRU Tracker ==
/// Access order shared by every namespace of the cache.
///
/// Every touch stamps the key with a monotonically increasing tick:
/// - Smallest tick = Least recently used
/// - Largest tick = Most recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys by access tick
    order: BTreeMap<u64, K>,
    /// Current tick of each key
    positions: HashMap<K, u64>,
    next_tick: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            order: BTreeMap::new(),
            positions: HashMap::new(),
            next_tick: 0,
        }
    }
}

impl<K: Clone + Eq + Hash> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: K) {
        if let Some(old_tick) = self.positions.get(&key) {
            self.order.remove(old_tick);
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.order.insert(tick, key.clone());
        self.positions.insert(key, tick);
    }

    // == Remove ==
    /// Removes a key from the tracker. Returns whether it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.positions.remove(key) {
            Some(tick) => {
                self.order.remove(&tick);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the key with the smallest tick.
    pub fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.positions.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.values().next()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    // == Contains ==
    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }
}

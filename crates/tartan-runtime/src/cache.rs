//! Adaptive Replacement Cache.
//!
//! [`ArcCache`] keeps two resident lists, `T1` (seen once recently) and `T2`
//! (seen at least twice), plus two ghost lists `B1`/`B2` holding keys recently
//! evicted from each. A ghost hit moves the adaptive target `p` toward the
//! list that would have kept the key, so the cache balances recency against
//! frequency on its own.
//!
//! ```text
//!   B1 ghosts ◀── evict ── T1 (once) │ T2 (twice+) ── evict ──▶ B2 ghosts
//!                          ◀─── p ───┼─── c - p ───▶
//! ```
//!
//! The cache is not synchronized; wrap it in a lock to share it.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Recency-ordered key set.
#[derive(Debug)]
struct LruList<K> {
    order: BTreeMap<u64, K>,
    ticks: HashMap<K, u64>,
    clock: u64,
}

impl<K: Clone + Eq + Hash> LruList<K> {
    fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            ticks: HashMap::new(),
            clock: 0,
        }
    }

    fn len(&self) -> usize {
        self.ticks.len()
    }

    fn contains(&self, key: &K) -> bool {
        self.ticks.contains_key(key)
    }

    /// Inserts `key` as most recently used, or refreshes it.
    fn touch(&mut self, key: K) {
        self.clock += 1;
        if let Some(old) = self.ticks.insert(key.clone(), self.clock) {
            self.order.remove(&old);
        }
        self.order.insert(self.clock, key);
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.ticks.remove(key) {
            Some(tick) => {
                self.order.remove(&tick);
                true
            }
            None => false,
        }
    }

    fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }
}

/// A bounded map with ARC eviction.
#[derive(Debug)]
pub struct ArcCache<K, V> {
    capacity: usize,
    target: usize,
    t1: LruList<K>,
    t2: LruList<K>,
    b1: LruList<K>,
    b2: LruList<K>,
    values: HashMap<K, V>,
}

impl<K: Clone + Eq + Hash, V> ArcCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            target: 0,
            t1: LruList::new(),
            t2: LruList::new(),
            b1: LruList::new(),
            b2: LruList::new(),
            values: HashMap::new(),
        }
    }

    /// Maximum number of resident entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `key` is resident. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Reads `key` without affecting recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    /// Reads `key`, promoting it to the frequent list.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.t1.remove(key) {
            self.t2.touch(key.clone());
        } else if self.t2.contains(key) {
            self.t2.touch(key.clone());
        } else {
            return None;
        }
        self.values.get(key)
    }

    /// Mutable access to `key`, promoting it like [`get`](Self::get).
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.t1.remove(key) {
            self.t2.touch(key.clone());
        } else if self.t2.contains(key) {
            self.t2.touch(key.clone());
        } else {
            return None;
        }
        self.values.get_mut(key)
    }

    /// Inserts or replaces `key`.
    pub fn insert(&mut self, key: K, value: V) {
        if self.t1.remove(&key) || self.t2.contains(&key) {
            self.t2.touch(key.clone());
            self.values.insert(key, value);
            return;
        }

        if self.b1.contains(&key) {
            let delta = ratio(self.b2.len(), self.b1.len());
            self.target = (self.target + delta).min(self.capacity);
            if self.resident() >= self.capacity {
                self.replace(false);
            }
            self.b1.remove(&key);
            self.t2.touch(key.clone());
            self.values.insert(key, value);
            return;
        }

        if self.b2.contains(&key) {
            let delta = ratio(self.b1.len(), self.b2.len());
            self.target = self.target.saturating_sub(delta);
            if self.resident() >= self.capacity {
                self.replace(true);
            }
            self.b2.remove(&key);
            self.t2.touch(key.clone());
            self.values.insert(key, value);
            return;
        }

        // Brand new key: keep |T1|+|B1| <= c and the whole history <= 2c.
        let recent = self.t1.len() + self.b1.len();
        if recent >= self.capacity {
            if self.t1.len() < self.capacity {
                self.b1.pop_oldest();
                if self.resident() >= self.capacity {
                    self.replace(false);
                }
            } else if let Some(oldest) = self.t1.pop_oldest() {
                self.values.remove(&oldest);
            }
        } else if self.history() >= self.capacity {
            if self.history() >= 2 * self.capacity {
                self.b2.pop_oldest();
            }
            if self.resident() >= self.capacity {
                self.replace(false);
            }
        }
        self.t1.touch(key.clone());
        self.values.insert(key, value);
    }

    /// Removes `key` from the cache and its history.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.t1.remove(key);
        self.t2.remove(key);
        self.b1.remove(key);
        self.b2.remove(key);
        self.values.remove(key)
    }

    /// Drops every entry and all history.
    pub fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.values.clear();
        self.target = 0;
    }

    fn resident(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn history(&self) -> usize {
        self.resident() + self.b1.len() + self.b2.len()
    }

    /// Evicts one resident entry into the matching ghost list.
    fn replace(&mut self, in_b2: bool) {
        let t1_len = self.t1.len();
        let from_t1 = t1_len > 0 && (t1_len > self.target || (t1_len == self.target && in_b2));

        let evicted = if from_t1 {
            self.t1.pop_oldest().inspect(|k| self.b1.touch(k.clone()))
        } else {
            self.t2.pop_oldest().inspect(|k| self.b2.touch(k.clone()))
        };

        if let Some(key) = evicted {
            self.values.remove(&key);
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> usize {
    if denominator == 0 || numerator <= denominator {
        1
    } else {
        numerator / denominator
    }
}

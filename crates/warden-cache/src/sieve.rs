//! Cost-bounded SIEVE eviction with per-entry expiry.
//!
//! # Algorithm
//!
//! - On access (hit): set the entry's `visited` bit to `true`.
//! - On insert, while the total cost would exceed the budget, scan from `hand`:
//!   - expired entry → evict it.
//!   - `visited == true` → reset to `false`, advance hand.
//!   - `visited == false` → evict this entry.
//!
//! Entries live in a `Vec` of slots with a `HashMap` index. Freed slots are
//! recycled through a free list so indices stay stable.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

#[derive(Debug)]
pub(crate) struct SieveCache<K, V> {
    /// Slots; `None` marks a freed slot.
    entries: Vec<Option<Entry<K, V>>>,
    /// Maps keys to their slot in `entries`.
    index: HashMap<K, usize>,
    /// Freed slots available for reuse.
    free: Vec<usize>,
    /// Current hand position for the SIEVE scan.
    hand: usize,
    max_cost: u64,
    cost: u64,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    cost: u64,
    expires_at: Option<Instant>,
    visited: bool,
}

impl<K, V> Entry<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl<K, V> SieveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `max_cost` total cost.
    ///
    /// # Panics
    ///
    /// Panics if `max_cost` is 0.
    pub(crate) fn new(max_cost: u64) -> Self {
        assert!(max_cost > 0, "cache max cost must be > 0");
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            hand: 0,
            max_cost,
            cost: 0,
        }
    }

    /// Returns the value for `key`, marking it as recently used.
    ///
    /// Expired entries are removed and reported as a miss.
    pub(crate) fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let &idx = self.index.get(key)?;
        let expired = self.entries[idx].as_ref().is_some_and(|e| e.is_expired(now));
        if expired {
            self.remove_slot(idx);
            return None;
        }
        let entry = self.entries[idx].as_mut()?;
        entry.visited = true;
        Some(entry.value.clone())
    }

    /// Inserts a value, evicting until it fits.
    ///
    /// Returns `false` without modifying the cache when `cost` alone exceeds
    /// the budget.
    pub(crate) fn insert(
        &mut self,
        key: K,
        value: V,
        cost: u64,
        expires_at: Option<Instant>,
        now: Instant,
    ) -> bool {
        if cost > self.max_cost {
            return false;
        }

        // Replacing a key frees its old cost before making room.
        if let Some(&idx) = self.index.get(&key) {
            self.remove_slot(idx);
        }

        while self.cost + cost > self.max_cost {
            match self.find_eviction_target(now) {
                Some(idx) => {
                    self.remove_slot(idx);
                }
                None => break,
            }
        }

        let entry = Entry {
            key: key.clone(),
            value,
            cost,
            expires_at,
            visited: false,
        };
        let idx = if let Some(idx) = self.free.pop() {
            self.entries[idx] = Some(entry);
            idx
        } else {
            self.entries.push(Some(entry));
            self.entries.len() - 1
        };
        self.index.insert(key, idx);
        self.cost += cost;
        true
    }

    /// Removes a key from the cache.
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        self.remove_slot(idx)
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.free.clear();
        self.hand = 0;
        self.cost = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn cost(&self) -> u64 {
        self.cost
    }

    fn remove_slot(&mut self, idx: usize) -> Option<V> {
        let entry = self.entries.get_mut(idx)?.take()?;
        self.index.remove(&entry.key);
        self.free.push(idx);
        self.cost -= entry.cost;
        Some(entry.value)
    }

    /// Scans from `hand` for an expired or unvisited entry.
    /// Resets `visited` bits along the way.
    fn find_eviction_target(&mut self, now: Instant) -> Option<usize> {
        if self.index.is_empty() {
            return None;
        }
        let slots = self.entries.len();

        // Bounded loop: the first pass resets visited bits, the second finds a target.
        for _ in 0..slots * 2 {
            let at = self.hand % slots;
            self.hand = (at + 1) % slots;
            if let Some(entry) = &mut self.entries[at] {
                if entry.is_expired(now) || !entry.visited {
                    return Some(at);
                }
                entry.visited = false;
            }
        }
        None
    }
}

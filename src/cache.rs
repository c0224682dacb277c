//! Bounded in-memory result cache
//!
//! Memoizes expensive idempotent lookups keyed by fingerprint. The map is
//! sharded (DashMap), so readers and writers of distinct keys never
//! coordinate and same-key writes resolve last-write-wins.

use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

struct CacheSlot<V> {
    value: V,
    touched: Instant,
}

/// Capacity-bounded cache with least-recently-touched eviction.
///
/// When an insert of a new key would exceed capacity, the entry with the
/// oldest touch instant is evicted first. Under concurrent inserts the bound
/// may briefly overshoot by the number of concurrent writers.
pub struct ResultCache<V> {
    entries: DashMap<String, CacheSlot<V>>,
    capacity: usize,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, refreshing its touch instant on a hit.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.entries.get_mut(key) {
            Some(mut slot) => {
                slot.touched = Instant::now();
                Some(slot.value.clone())
            }
            None => None,
        }
    }

    /// Insert or overwrite. Overwriting an existing key never evicts.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheSlot {
                value,
                touched: Instant::now(),
            },
        );
    }

    fn evict_oldest(&self) {
        let mut oldest: Option<(String, Instant)> = None;
        for entry in self.entries.iter() {
            let touched = entry.value().touched;
            match &oldest {
                Some((_, t)) if touched >= *t => {}
                _ => oldest = Some((entry.key().clone(), touched)),
            }
        }
        if let Some((key, _)) = oldest {
            debug!(key = %key, "evicting least-recently-touched cache entry");
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

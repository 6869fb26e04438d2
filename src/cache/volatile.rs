//! Volatile Cache - in-process fast tier
//!
//! Bounded, insertion-ordered key/value store with per-entry TTL.
//!
//! # Design
//!
//! - FIFO eviction: when full, the oldest-inserted key is dropped before a new
//!   key is added. Reads never change the order.
//! - Overwriting an existing key replaces its entry but keeps its original
//!   position in the eviction order.
//! - Lazy expiry: an expired entry is removed by the `get` that observes it.
//!   There is no background sweeper.
//! - The check-then-evict-then-insert sequence runs under one lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::entry::{CacheEntry, CacheKey};
use super::DEFAULT_MAX_MEMORY_ENTRIES;
use crate::clock::SharedClock;

/// Volatile cache configuration
#[derive(Debug, Clone)]
pub struct VolatileConfig {
    /// Maximum number of entries
    pub max_entries: usize,
}

impl Default for VolatileConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }
}

struct Inner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let removed = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(removed)
    }
}

/// Volatile cache - in-memory tier
pub struct VolatileCache<V> {
    inner: Mutex<Inner<V>>,
    config: VolatileConfig,
    clock: SharedClock,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> VolatileCache<V> {
    /// Create a new volatile cache
    ///
    /// `max_entries` is clamped to at least 1.
    pub fn new(mut config: VolatileConfig, clock: SharedClock) -> Self {
        config.max_entries = config.max_entries.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Store a value expiring `ttl` from now
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.entries.get_mut(&key) {
            *slot = entry;
            return;
        }

        if inner.entries.len() >= self.config.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %oldest, "Evicted oldest volatile entry");
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, entry);
    }

    /// Get a live value, removing it if it has expired
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        inner.remove(key);
        debug!(key = %key, "Volatile entry expired");
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &CacheKey) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Whether the key is stored (expired or not)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Stored keys in insertion order
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.lock().order.iter().cloned().collect()
    }

    /// Remove all entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.config.max_entries
    }

    /// Get cache statistics
    pub fn stats(&self) -> VolatileStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        VolatileStats {
            entries: self.len(),
            capacity: self.capacity(),
            hits,
            misses,
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Volatile cache statistics
#[derive(Debug, Clone)]
pub struct VolatileStats {
    /// Number of entries
    pub entries: usize,
    /// Capacity in entries
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    /// FIFO eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================

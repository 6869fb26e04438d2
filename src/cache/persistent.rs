//! Persistent Cache - durable slow tier
//!
//! Same TTL semantics as the volatile tier, backed by a [`DurableStore`].
//! Every key is written under a fixed namespace prefix so unrelated data in
//! the same store is never touched.
//!
//! # Design
//!
//! - Each `set` is followed by a sweep: expired and undecodable records are
//!   deleted, then the oldest survivors (store write order) are deleted until
//!   the entry count is at or under the cap.
//! - Persistence is best effort. Storage errors are logged and swallowed;
//!   reads that fail are misses, writes that fail are dropped.
//! - Records that fail to decode are treated as misses and deleted. A sweep
//!   decodes the whole record, value included, so a record holding a value
//!   of the wrong type is swept even if nobody reads it. One prefix therefore
//!   belongs to exactly one value type.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, CacheKey};
use super::store::DurableStore;
use super::{DEFAULT_MAX_STORAGE_ENTRIES, DEFAULT_STORAGE_PREFIX};
use crate::clock::SharedClock;
use crate::error::Result;

/// Persistent cache configuration
#[derive(Debug, Clone)]
pub struct PersistentConfig {
    /// Maximum number of entries kept after a sweep
    pub max_entries: usize,
    /// Prefix applied to every persisted key
    pub prefix: String,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_STORAGE_ENTRIES,
            prefix: DEFAULT_STORAGE_PREFIX.to_string(),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records removed because they expired or could not be decoded
    pub expired: usize,
    /// Live records removed to get back under the cap
    pub evicted: usize,
    /// Records left after the sweep
    pub remaining: usize,
}

/// Persistent cache - durable tier
pub struct PersistentCache<V> {
    store: Arc<dyn DurableStore>,
    config: PersistentConfig,
    clock: SharedClock,
    hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    storage_errors: AtomicU64,
    evictions: AtomicU64,
    _value: PhantomData<fn() -> V>,
}

impl<V> PersistentCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Create a persistent cache over `store`
    pub fn new(config: PersistentConfig, store: Arc<dyn DurableStore>, clock: SharedClock) -> Self {
        Self {
            store,
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            storage_errors: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            _value: PhantomData,
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    fn storage_error(&self, op: &str, key: &str, err: &crate::error::Error) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, key, "Persistent cache storage error: {}", err);
    }

    /// Store a value expiring `ttl` from now, then sweep
    pub fn set(&self, key: &CacheKey, value: &V, ttl: Duration) {
        let storage_key = self.storage_key(key);
        let entry = CacheEntry::new(value, self.clock.now(), ttl);

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, "Failed to encode cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set_item(&storage_key, &raw) {
            self.storage_error("set", &storage_key, &e);
            // Space may be held by stale records: sweep and retry once
            self.cleanup();
            if let Err(e) = self.store.set_item(&storage_key, &raw) {
                self.storage_error("set", &storage_key, &e);
                return;
            }
        }

        self.cleanup();
    }

    /// Get a live value; expired or undecodable records are deleted
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let storage_key = self.storage_key(key);

        let raw = match self.store.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.storage_error("get", &storage_key, &e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) if !entry.is_expired(self.clock.now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.into_value())
            }
            Ok(_) => {
                debug!(key = %key, "Persistent entry expired");
                self.remove_quietly(&storage_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, "Dropping undecodable persistent entry: {}", e);
                self.remove_quietly(&storage_key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove an entry, returning whether it existed
    pub fn delete(&self, key: &CacheKey) -> bool {
        let storage_key = self.storage_key(key);
        match self.store.get_item(&storage_key) {
            Ok(Some(_)) => self.remove_quietly(&storage_key),
            Ok(None) => false,
            Err(e) => {
                self.storage_error("delete", &storage_key, &e);
                false
            }
        }
    }

    fn remove_quietly(&self, storage_key: &str) -> bool {
        match self.store.remove_item(storage_key) {
            Ok(()) => true,
            Err(e) => {
                self.storage_error("remove", storage_key, &e);
                false
            }
        }
    }

    /// Keys under this cache's prefix, in store order
    fn prefixed_keys(&self) -> Result<Vec<String>> {
        let prefix = &self.config.prefix;
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix.as_str()))
            .collect())
    }

    /// Stored cache keys (prefix stripped), in write order
    pub fn keys(&self) -> Vec<CacheKey> {
        match self.prefixed_keys() {
            Ok(keys) => keys
                .into_iter()
                .map(|k| CacheKey::raw(&k[self.config.prefix.len()..]))
                .collect(),
            Err(e) => {
                self.storage_error("keys", &self.config.prefix, &e);
                Vec::new()
            }
        }
    }

    /// Number of stored entries under the prefix
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry under the prefix
    pub fn clear(&self) {
        match self.prefixed_keys() {
            Ok(keys) => {
                for key in keys {
                    self.remove_quietly(&key);
                }
            }
            Err(e) => self.storage_error("clear", &self.config.prefix, &e),
        }
    }

    /// Sweep expired/undecodable records, then enforce the entry cap
    pub fn cleanup(&self) -> SweepReport {
        let keys = match self.prefixed_keys() {
            Ok(keys) => keys,
            Err(e) => {
                self.storage_error("cleanup", &self.config.prefix, &e);
                return SweepReport::default();
            }
        };

        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut survivors = Vec::with_capacity(keys.len());

        for key in keys {
            let live = match self.store.get_item(&key) {
                Ok(Some(raw)) => match serde_json::from_str::<CacheEntry<V>>(&raw) {
                    Ok(entry) => !entry.is_expired(now),
                    Err(e) => {
                        debug!(key = %key, error = %e, "Sweeping undecodable record");
                        self.decode_failures.fetch_add(1, Ordering::Relaxed);
                        false
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    // Unreadable now, may be readable later: leave it alone
                    self.storage_error("cleanup", &key, &e);
                    survivors.push(key);
                    continue;
                }
            };

            if live {
                survivors.push(key);
            } else if self.remove_quietly(&key) {
                report.expired += 1;
            }
        }

        let overflow = survivors.len().saturating_sub(self.config.max_entries);
        for key in survivors.iter().take(overflow) {
            if self.remove_quietly(key) {
                report.evicted += 1;
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        report.remaining = survivors.len() - report.evicted;

        if report.expired > 0 || report.evicted > 0 {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                remaining = report.remaining,
                "Persistent cache sweep"
            );
        }
        report
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.config.max_entries
    }

    /// Get cache statistics
    pub fn stats(&self) -> PersistentStats {
        PersistentStats {
            entries: self.len(),
            capacity: self.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Persistent cache statistics
#[derive(Debug, Clone)]
pub struct PersistentStats {
    /// Number of entries
    pub entries: usize,
    /// Capacity in entries
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Records dropped because they could not be decoded
    pub decode_failures: u64,
    /// Storage-layer errors swallowed
    pub storage_errors: u64,
    /// Live records removed by the entry cap
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================

//! Cache Facade - unified two-tier cache
//!
//! Presents the volatile and persistent tiers as one `get/set/delete/clear`
//! contract, promotes persistent hits into the volatile tier, and supports
//! substring invalidation across both tiers.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::category::{CacheCategory, TtlTable};
use super::entry::{CacheKey, Scalar};
use super::persistent::{PersistentCache, PersistentConfig, SweepReport};
use super::store::DurableStore;
use super::volatile::{VolatileCache, VolatileConfig};
use super::{DEFAULT_MAX_MEMORY_ENTRIES, DEFAULT_MAX_STORAGE_ENTRIES, DEFAULT_STORAGE_PREFIX};
use crate::clock::SharedClock;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Volatile tier capacity
    pub max_memory_entries: usize,
    /// Persistent tier capacity
    pub max_storage_entries: usize,
    /// Prefix for persisted keys
    pub storage_prefix: String,
    /// Data category this facade serves; its TTL is used for promotions
    pub category: CacheCategory,
    /// Category → TTL table
    pub ttls: TtlTable,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
            max_storage_entries: DEFAULT_MAX_STORAGE_ENTRIES,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            category: CacheCategory::ProductDetail,
            ttls: TtlTable::default(),
        }
    }
}

/// Which tiers an operation may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierScope {
    /// Volatile and persistent tiers
    #[default]
    All,
    /// Volatile tier only
    VolatileOnly,
}

/// Facade-level counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacadeStats {
    /// Entries in the volatile tier
    pub volatile_entries: usize,
    /// Entries in the persistent tier
    pub persistent_entries: usize,
    /// Lookups answered by either tier
    pub hits: u64,
    /// Persistent hits copied into the volatile tier
    pub promotions: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
}

impl FacadeStats {
    /// Hit ratio over all lookups (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Unified two-tier cache
pub struct CacheFacade<V> {
    volatile: VolatileCache<V>,
    persistent: PersistentCache<V>,
    config: CacheConfig,
    hits: AtomicU64,
    promotions: AtomicU64,
    misses: AtomicU64,
}

impl<V> CacheFacade<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Create a facade over `store`
    pub fn new(config: CacheConfig, store: Arc<dyn DurableStore>, clock: SharedClock) -> Self {
        let volatile = VolatileCache::new(
            VolatileConfig {
                max_entries: config.max_memory_entries,
            },
            clock.clone(),
        );
        let persistent = PersistentCache::new(
            PersistentConfig {
                max_entries: config.max_storage_entries,
                prefix: config.storage_prefix.clone(),
            },
            store,
            clock,
        );

        Self {
            volatile,
            persistent,
            config,
            hits: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Derive a canonical key from a namespace and parameters
    pub fn generate_key<I, K, S>(namespace: &str, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Scalar>,
    {
        CacheKey::generate(namespace, params)
    }

    /// TTL applied when a persistent hit is promoted
    pub fn promotion_ttl(&self) -> Duration {
        self.config.ttls.ttl(self.config.category)
    }

    /// Default TTL for a data category
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        self.config.ttls.ttl(category)
    }

    /// Look up a key in both tiers
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_scoped(key, TierScope::All)
    }

    /// Look up a key, optionally skipping the persistent tier
    pub fn get_scoped(&self, key: &CacheKey, scope: TierScope) -> Option<V> {
        if let Some(value) = self.volatile.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        if scope == TierScope::All {
            if let Some(value) = self.persistent.get(key) {
                // Remaining persistent TTL is not carried across
                self.volatile.set(key.clone(), value.clone(), self.promotion_ttl());
                self.promotions.fetch_add(1, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Promoted persistent entry");
                return Some(value);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value in both tiers
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        self.set_scoped(key, value, ttl, TierScope::All);
    }

    /// Store a value; `TierScope::VolatileOnly` skips persistence
    pub fn set_scoped(&self, key: CacheKey, value: V, ttl: Duration, scope: TierScope) {
        if scope == TierScope::All {
            self.persistent.set(&key, &value, ttl);
        }
        self.volatile.set(key, value, ttl);
    }

    /// Store a value in both tiers with its category's default TTL
    pub fn set_for(&self, key: CacheKey, value: V, category: CacheCategory) {
        let ttl = self.ttl_for(category);
        self.set(key, value, ttl);
    }

    /// Remove a key from both tiers, returning whether any tier held it
    pub fn delete(&self, key: &CacheKey) -> bool {
        let in_volatile = self.volatile.delete(key);
        let in_persistent = self.persistent.delete(key);
        in_volatile || in_persistent
    }

    /// Remove every entry from both tiers
    pub fn clear(&self) {
        self.volatile.clear();
        self.persistent.clear();
    }

    /// Delete every key containing `pattern` from both tiers.
    ///
    /// Linear in the number of stored keys, which both tiers cap.
    /// Returns the number of distinct keys removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut removed: Vec<CacheKey> = Vec::new();

        for key in self.volatile.keys() {
            if key.matches(pattern) && self.volatile.delete(&key) {
                removed.push(key);
            }
        }
        for key in self.persistent.keys() {
            if key.matches(pattern) && self.persistent.delete(&key) && !removed.contains(&key) {
                removed.push(key);
            }
        }

        debug!(pattern, removed = removed.len(), "Invalidated cache keys");
        removed.len()
    }

    /// Read-through lookup.
    ///
    /// On a miss in both tiers `load` runs; a successful value is stored with
    /// this facade's category TTL. Loader errors are returned unchanged and
    /// nothing is cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: &CacheKey, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = load().await?;
        self.set(key.clone(), value.clone(), self.promotion_ttl());
        Ok(value)
    }

    /// Run a persistent-tier sweep now
    pub fn sweep(&self) -> SweepReport {
        self.persistent.cleanup()
    }

    /// Get reference to the volatile tier
    pub fn volatile(&self) -> &VolatileCache<V> {
        &self.volatile
    }

    /// Get reference to the persistent tier
    pub fn persistent(&self) -> &PersistentCache<V> {
        &self.persistent
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Facade statistics
    pub fn stats(&self) -> FacadeStats {
        FacadeStats {
            volatile_entries: self.volatile.len(),
            persistent_entries: self.persistent.len(),
            hits: self.hits.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryStore;
    use crate::clock::ManualClock;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        facade: CacheFacade<Value>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(config: CacheConfig) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let facade = CacheFacade::new(config, store.clone(), clock.clone());
        Fixture {
            facade,
            store,
            clock,
        }
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::raw(name)
    }

    const TTL: Duration = Duration::from_secs(600);

    #[test]
    fn test_facade_set_get_volatile_hit() {
        let f = fixture(CacheConfig::default());
        f.facade.set(key("cat_1"), json!({"name": "Brakes"}), TTL);

        assert_eq!(f.facade.get(&key("cat_1")), Some(json!({"name": "Brakes"})));
        assert_eq!(f.facade.stats().promotions, 0);
        assert_eq!(f.facade.stats().hits, 1);
    }

    #[test]
    fn test_facade_writes_both_tiers() {
        let f = fixture(CacheConfig::default());
        f.facade.set(key("a"), json!(1), TTL);

        assert!(f.facade.volatile().contains(&key("a")));
        assert_eq!(f.facade.persistent().len(), 1);
    }

    #[test]
    fn test_facade_volatile_only_write() {
        let f = fixture(CacheConfig::default());
        f.facade
            .set_scoped(key("a"), json!(1), TTL, TierScope::VolatileOnly);

        assert!(f.facade.volatile().contains(&key("a")));
        assert!(f.facade.persistent().is_empty());
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_facade_promotion() {
        let f = fixture(CacheConfig::default());
        f.facade.persistent().set(&key("p"), &json!("cold"), TTL);
        assert!(!f.facade.volatile().contains(&key("p")));

        assert_eq!(f.facade.get(&key("p")), Some(json!("cold")));
        assert!(f.facade.volatile().contains(&key("p")));
        assert_eq!(f.facade.volatile().get(&key("p")), Some(json!("cold")));
        assert_eq!(f.facade.stats().promotions, 1);
    }

    #[test]
    fn test_facade_promotion_uses_category_ttl() {
        let config = CacheConfig {
            category: CacheCategory::User,
            ..Default::default()
        };
        let f = fixture(config);
        assert_eq!(f.facade.promotion_ttl(), Duration::from_secs(60));

        // Long persistent TTL, short promotion TTL
        f.facade
            .persistent()
            .set(&key("u"), &json!("me"), Duration::from_secs(3600));
        f.facade.get(&key("u"));

        f.clock.advance(Duration::from_secs(61));
        assert!(f.facade.volatile().get(&key("u")).is_none());
        // Still served from (and re-promoted out of) the persistent tier
        assert_eq!(f.facade.get(&key("u")), Some(json!("me")));
        assert_eq!(f.facade.stats().promotions, 2);
    }

    #[test]
    fn test_facade_volatile_only_read_skips_persistent() {
        let f = fixture(CacheConfig::default());
        f.facade.persistent().set(&key("p"), &json!(1), TTL);

        assert!(f
            .facade
            .get_scoped(&key("p"), TierScope::VolatileOnly)
            .is_none());
        assert!(!f.facade.volatile().contains(&key("p")));
        assert_eq!(f.facade.stats().misses, 1);
    }

    #[test]
    fn test_facade_total_miss() {
        let f = fixture(CacheConfig::default());
        assert!(f.facade.get(&key("nope")).is_none());
        assert_eq!(f.facade.stats().misses, 1);
    }

    #[test]
    fn test_facade_delete_both_tiers() {
        let f = fixture(CacheConfig::default());
        f.facade.set(key("a"), json!(1), TTL);

        assert!(f.facade.delete(&key("a")));
        assert!(f.facade.get(&key("a")).is_none());
        assert!(!f.facade.delete(&key("a")));
    }

    #[test]
    fn test_facade_clear() {
        let f = fixture(CacheConfig::default());
        for i in 0..5 {
            f.facade.set(CacheKey::raw(format!("k{}", i)), json!(i), TTL);
        }
        f.facade.clear();
        assert!(f.facade.volatile().is_empty());
        assert!(f.facade.persistent().is_empty());
    }

    #[test]
    fn test_facade_invalidate_pattern() {
        let f = fixture(CacheConfig::default());
        f.facade.set(key("products_abc"), json!(1), TTL);
        f.facade.set(key("products_def"), json!(2), TTL);
        f.facade.set(key("brands_all"), json!(3), TTL);
        // Persistent-only entry matching the pattern
        f.facade.persistent().set(&key("products_ghi"), &json!(4), TTL);

        let removed = f.facade.invalidate_pattern("products");
        assert_eq!(removed, 3);

        assert!(f.facade.get(&key("products_abc")).is_none());
        assert!(f.facade.get(&key("products_def")).is_none());
        assert!(f.facade.get(&key("products_ghi")).is_none());
        assert_eq!(f.facade.get(&key("brands_all")), Some(json!(3)));
    }

    #[test]
    fn test_facade_generated_keys_invalidate_by_namespace() {
        let f = fixture(CacheConfig::default());
        let k1 = CacheFacade::<Value>::generate_key("products", [("page", 1)]);
        let k2 = CacheFacade::<Value>::generate_key("products", [("page", 2)]);
        f.facade.set(k1.clone(), json!("p1"), TTL);
        f.facade.set(k2.clone(), json!("p2"), TTL);

        f.facade.invalidate_pattern("products_");
        assert!(f.facade.get(&k1).is_none());
        assert!(f.facade.get(&k2).is_none());
    }

    #[test]
    fn test_facade_set_for_category() {
        let f = fixture(CacheConfig::default());
        f.facade.set_for(key("s"), json!("hits"), CacheCategory::Search);

        f.clock.advance(Duration::from_secs(119));
        assert!(f.facade.get(&key("s")).is_some());
        f.clock.advance(Duration::from_secs(2));
        assert!(f.facade.get(&key("s")).is_none());
    }

    #[test]
    fn test_facade_survives_store_outage() {
        let f = fixture(CacheConfig::default());
        f.store.set_unavailable(true);

        f.facade.set(key("a"), json!(1), TTL);
        assert_eq!(f.facade.get(&key("a")), Some(json!(1)));
        assert!(f.facade.delete(&key("a")));
        assert!(f.facade.persistent().stats().storage_errors > 0);
    }

    #[tokio::test]
    async fn test_facade_get_or_load() {
        let f = fixture(CacheConfig::default());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<Value, String> = f
                .facade
                .get_or_load(&key("lazy"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("loaded"))
                })
                .await;
            assert_eq!(value.unwrap(), json!("loaded"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_facade_get_or_load_error_not_cached() {
        let f = fixture(CacheConfig::default());

        let result: Result<Value, String> = f
            .facade
            .get_or_load(&key("bad"), || async { Err("upstream down".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "upstream down");
        assert!(f.facade.get(&key("bad")).is_none());
    }
}

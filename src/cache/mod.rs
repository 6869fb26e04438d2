//! Two-Tier Response Cache
//!
//! A volatile in-memory tier in front of a persistent tier backed by a
//! durable key/value store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            Cache Facade                                  │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  Volatile Cache (RAM)            │  Persistent Cache (Durable Store)     │
//! │  ┌────────────────────────────┐  │  ┌─────────────────────────────────┐  │
//! │  │ HashMap + insertion order  │  │  │ prefixed keys, JSON records     │  │
//! │  │ FIFO, cap 50, lazy expiry  │  │  │ sweep on write, cap 100         │  │
//! │  └────────────────────────────┘  │  └─────────────────────────────────┘  │
//! │               ▲                  │                  │                    │
//! │               └──────── promotion on persistent hit ┘                    │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups try the volatile tier, then the persistent tier. A persistent hit
//! is copied into the volatile tier before it is returned.

mod category;
mod entry;
mod facade;
mod persistent;
mod store;
mod volatile;

pub use category::{CacheCategory, TtlTable};
pub use entry::{CacheEntry, CacheKey, Scalar};
pub use facade::{CacheConfig, CacheFacade, FacadeStats, TierScope};
pub use persistent::{PersistentCache, PersistentConfig, PersistentStats, SweepReport};
pub use store::{DurableStore, FileStore, InMemoryStore};
pub use volatile::{VolatileCache, VolatileConfig, VolatileStats};

/// Default volatile tier capacity (entries)
pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 50;

/// Default persistent tier capacity (entries)
pub const DEFAULT_MAX_STORAGE_ENTRIES: usize = 100;

/// Prefix applied to every persisted key
pub const DEFAULT_STORAGE_PREFIX: &str = "respcache:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities() {
        assert_eq!(DEFAULT_MAX_MEMORY_ENTRIES, 50);
        assert_eq!(DEFAULT_MAX_STORAGE_ENTRIES, 100);
    }

    #[test]
    fn test_prefix_is_namespaced() {
        assert!(DEFAULT_STORAGE_PREFIX.ends_with(':'));
    }
}

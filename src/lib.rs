//! respcache - Two-Tier Response Cache with Call Metrics
//!
//! Caches responses of outbound calls in a volatile in-memory tier backed by
//! a persistent tier, and measures those calls with a bounded metrics
//! collector.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Caller                                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    miss    ┌──────────────┐    ┌──────────┐   │
//! │  │ Cache Facade │───────────▶│ Interceptor  │───▶│ Metrics  │   │
//! │  │ (RAM → disk) │◀───────────│ (timed call) │    │ Collector│   │
//! │  └──────────────┘   store    └──────────────┘    └──────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Volatile and persistent tiers behind a facade
//! - [`clock`] - Injectable time source
//! - [`config`] - YAML settings
//! - [`error`] - Error types
//! - [`interceptor`] - Timed call wrapper and metered HTTP client
//! - [`monitoring`] - Metrics collector
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use respcache::cache::{CacheConfig, CacheFacade, InMemoryStore};
//! use respcache::clock::SystemClock;
//!
//! let cache: CacheFacade<String> = CacheFacade::new(
//!     CacheConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(SystemClock),
//! );
//! let key = CacheFacade::<String>::generate_key("categories", [("id", 1)]);
//! cache.set(key.clone(), "Brakes".to_string(), Duration::from_secs(1800));
//! assert_eq!(cache.get(&key).as_deref(), Some("Brakes"));
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod monitoring;

// Re-export commonly used types
pub use cache::{CacheCategory, CacheConfig, CacheFacade, CacheKey, DurableStore};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Settings;
pub use error::{Error, Result};
pub use interceptor::{endpoint_key, CallError, CallInterceptor, MeteredHttpClient};
pub use monitoring::{MetricCategory, MetricsCollector, MetricsConfig};

//! Runtime settings
//!
//! Loaded from a YAML file; every field is optional and falls back to its
//! default.
//!
//! ```yaml
//! store_path: /var/lib/respcache/store.json
//! cache:
//!   max_memory_entries: 50
//!   category: product-list
//!   ttls:
//!     search_secs: 90
//! metrics:
//!   max_history_per_key: 50
//!   context_label: storefront
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::monitoring::MetricsConfig;

/// Default location of the durable store file
pub const DEFAULT_STORE_PATH: &str = "respcache-store.json";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tier sizes, storage prefix and TTL table
    pub cache: CacheConfig,
    /// Metrics collector settings
    pub metrics: MetricsConfig,
    /// Backing file for the persistent tier
    pub store_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            metrics: MetricsConfig::default(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl Settings {
    /// Parse settings from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let settings = Self::from_yaml(&text)?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cache.max_memory_entries == 0 {
            return Err(Error::Config("cache.max_memory_entries must be at least 1".into()));
        }
        if self.cache.max_storage_entries == 0 {
            return Err(Error::Config("cache.max_storage_entries must be at least 1".into()));
        }
        if self.cache.storage_prefix.is_empty() {
            return Err(Error::Config("cache.storage_prefix must not be empty".into()));
        }
        if self.metrics.max_history_per_key == 0 {
            return Err(Error::Config("metrics.max_history_per_key must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheCategory;
    use std::time::Duration;

    #[test]
    fn test_empty_yaml_is_default() {
        let settings = Settings::from_yaml("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache.max_memory_entries, 50);
        assert_eq!(settings.cache.max_storage_entries, 100);
        assert_eq!(settings.metrics.max_history_per_key, 50);
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
store_path: /tmp/store.json
cache:
  category: search
  ttls:
    search_secs: 90
metrics:
  context_label: storefront
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.store_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(settings.cache.category, CacheCategory::Search);
        assert_eq!(
            settings.cache.ttls.ttl(CacheCategory::Search),
            Duration::from_secs(90)
        );
        assert_eq!(
            settings.cache.ttls.ttl(CacheCategory::Taxonomy),
            Duration::from_secs(1800)
        );
        assert_eq!(settings.metrics.context_label.as_deref(), Some("storefront"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_yaml("cache:\n  max_memory_entries: 0\n").is_err());
        assert!(Settings::from_yaml("cache:\n  storage_prefix: \"\"\n").is_err());
        assert!(Settings::from_yaml("cache: [1, 2]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("respcache.yaml");
        std::fs::write(&path, "metrics:\n  max_history_per_key: 10\n").unwrap();

        let settings = Settings::load_or_default(Some(&path)).unwrap();
        assert_eq!(settings.metrics.max_history_per_key, 10);

        let missing = dir.path().join("absent.yaml");
        assert!(Settings::load(&missing).is_err());
        assert_eq!(Settings::load_or_default(None).unwrap(), Settings::default());
    }
}

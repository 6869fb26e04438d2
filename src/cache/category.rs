//! Data Categories and Default TTLs
//!
//! Callers pick the TTL that suits their data; this table maps each data
//! category to its default so the facade logic never hardcodes durations.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Category of cached data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheCategory {
    /// Short-lived search results
    Search,
    /// Single product detail
    ProductDetail,
    /// Product listings
    ProductList,
    /// Categories, brands and other slow-changing taxonomy
    Taxonomy,
    /// Per-user data
    User,
}

impl CacheCategory {
    /// All categories, in table order
    pub const ALL: [CacheCategory; 5] = [
        CacheCategory::Search,
        CacheCategory::ProductDetail,
        CacheCategory::ProductList,
        CacheCategory::Taxonomy,
        CacheCategory::User,
    ];

    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Search => "search",
            CacheCategory::ProductDetail => "product-detail",
            CacheCategory::ProductList => "product-list",
            CacheCategory::Taxonomy => "taxonomy",
            CacheCategory::User => "user",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown cache category: {}", s)))
    }
}

/// Category → TTL table (seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlTable {
    /// Search results TTL
    pub search_secs: u64,
    /// Product detail TTL
    pub product_detail_secs: u64,
    /// Product list TTL
    pub product_list_secs: u64,
    /// Taxonomy / brand TTL
    pub taxonomy_secs: u64,
    /// Per-user data TTL
    pub user_secs: u64,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            search_secs: 2 * 60,
            product_detail_secs: 10 * 60,
            product_list_secs: 5 * 60,
            taxonomy_secs: 30 * 60,
            user_secs: 60,
        }
    }
}

impl TtlTable {
    /// TTL for a category
    pub fn ttl(&self, category: CacheCategory) -> Duration {
        let secs = match category {
            CacheCategory::Search => self.search_secs,
            CacheCategory::ProductDetail => self.product_detail_secs,
            CacheCategory::ProductList => self.product_list_secs,
            CacheCategory::Taxonomy => self.taxonomy_secs,
            CacheCategory::User => self.user_secs,
        };
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = TtlTable::default();
        assert_eq!(table.ttl(CacheCategory::Search), Duration::from_secs(120));
        assert_eq!(table.ttl(CacheCategory::ProductDetail), Duration::from_secs(600));
        assert_eq!(table.ttl(CacheCategory::ProductList), Duration::from_secs(300));
        assert_eq!(table.ttl(CacheCategory::Taxonomy), Duration::from_secs(1800));
        assert_eq!(table.ttl(CacheCategory::User), Duration::from_secs(60));
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in CacheCategory::ALL {
            let parsed: CacheCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("bogus".parse::<CacheCategory>().is_err());
    }

    #[test]
    fn test_partial_table_override() {
        let table: TtlTable = serde_yaml::from_str("search_secs: 30\n").unwrap();
        assert_eq!(table.ttl(CacheCategory::Search), Duration::from_secs(30));
        assert_eq!(table.ttl(CacheCategory::Taxonomy), Duration::from_secs(1800));
    }
}

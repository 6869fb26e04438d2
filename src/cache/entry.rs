//! Cache Entry and Key Types
//!
//! Entries are immutable once written; a `set` on the same key replaces the
//! whole entry. Keys are derived canonically from a namespace and scalar
//! parameters so call sites that build parameters in different orders share
//! cache slots.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use serde_json::Value;

use crate::clock::{expiry_after, Timestamp};

/// Cached value with its absolute expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// Cached value
    pub value: V,
    /// Instant after which the entry is treated as absent
    pub expires_at: Timestamp,
}

impl<V> CacheEntry<V> {
    /// Create an entry expiring `ttl` after `now`. Oversized TTLs clamp to
    /// the latest storable expiry.
    pub fn new(value: V, now: Timestamp, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: expiry_after(now, ttl),
        }
    }

    /// Whether the entry has expired at `now` (strictly after `expires_at`)
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }

    /// Consume the entry and return its value
    pub fn into_value(self) -> V {
        self.value
    }
}

/// Scalar parameter value used to build cache keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Absent / null value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
}

impl Scalar {
    /// Parse a CLI-style literal: `true`/`false`/`null`, integers, floats,
    /// anything else is a string.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "null" => Scalar::Null,
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => {
                if let Ok(i) = raw.parse::<i64>() {
                    Scalar::Int(i)
                } else if let Ok(f) = raw.parse::<f64>() {
                    Scalar::Float(f)
                } else {
                    Scalar::Str(raw.to_string())
                }
            }
        }
    }

    /// JSON form used inside cache keys. Non-finite floats have no JSON
    /// number, so they become `{"$f64":"NaN"}` and friends, which neither
    /// `null` nor any string can produce.
    fn canonical(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None => {
                    let tag = if f.is_nan() {
                        "NaN"
                    } else if f.is_sign_positive() {
                        "Infinity"
                    } else {
                        "-Infinity"
                    };
                    serde_json::json!({ "$f64": tag })
                }
            },
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// Opaque cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a raw key string as-is
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from a namespace and parameters.
    ///
    /// Parameter names are sorted before serialization, so any insertion
    /// order of the same pairs yields the same key. A repeated name keeps
    /// its last value.
    pub fn generate<I, K, S>(namespace: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Scalar>,
    {
        let sorted: BTreeMap<String, Value> = params
            .into_iter()
            .map(|(k, v)| (k.into(), Into::<Scalar>::into(v).canonical()))
            .collect();

        let canonical = serde_json::to_string(&sorted).unwrap_or_default();
        Self(format!("{}_{}", namespace, canonical))
    }

    /// Key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key contains `pattern`
    #[inline]
    pub fn matches(&self, pattern: &str) -> bool {
        self.0.contains(pattern)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::raw(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::raw(value)
    }
}

// =============================================================================
// Tests
// =============================================================================

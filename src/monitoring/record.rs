//! Metric events
//!
//! Each category carries its own fixed field set. The category of an event is
//! implied by its variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::Error;

/// Metric category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    /// Outbound calls
    Api,
    /// Component render durations
    Render,
    /// Page quality samples (LCP, CLS, ...)
    WebVital,
    /// Route transitions
    Navigation,
    /// Cache lookups
    Cache,
}

impl MetricCategory {
    /// All categories
    pub const ALL: [MetricCategory; 5] = [
        MetricCategory::Api,
        MetricCategory::Render,
        MetricCategory::WebVital,
        MetricCategory::Navigation,
        MetricCategory::Cache,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Api => "api",
            MetricCategory::Render => "render",
            MetricCategory::WebVital => "web_vital",
            MetricCategory::Navigation => "navigation",
            MetricCategory::Cache => "cache",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown metric category: {}", s)))
    }
}

/// Outbound call outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApiRecord {
    /// Elapsed time in milliseconds, measured on the monotonic clock
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    /// Whether the call succeeded at the application level
    pub success: bool,
    /// Whether the response was served from a cache
    pub cache_hit: bool,
}

/// Component render timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenderRecord {
    /// Render time in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    /// Render phase, e.g. "mount" or "update"
    pub phase: String,
}

/// Web vital sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WebVitalRecord {
    /// Vital name, e.g. "LCP" or "CLS"
    pub name: String,
    /// Sample value in the vital's own unit
    pub value: f64,
}

/// Route transition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NavigationRecord {
    /// Route navigated away from
    pub from: String,
    /// Transition time in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: f64,
}

/// Cache lookup outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheRecord {
    /// Whether the lookup found a live entry
    pub hit: bool,
}

/// A single metric event
///
/// Serialized as the bare field set of its variant; the category is carried
/// by the export's enclosing map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricEvent {
    /// Outbound call
    Api(ApiRecord),
    /// Component render
    Render(RenderRecord),
    /// Web vital sample
    WebVital(WebVitalRecord),
    /// Route transition
    Navigation(NavigationRecord),
    /// Cache lookup
    Cache(CacheRecord),
}

impl MetricEvent {
    /// Category this event is filed under
    pub fn category(&self) -> MetricCategory {
        match self {
            MetricEvent::Api(_) => MetricCategory::Api,
            MetricEvent::Render(_) => MetricCategory::Render,
            MetricEvent::WebVital(_) => MetricCategory::WebVital,
            MetricEvent::Navigation(_) => MetricCategory::Navigation,
            MetricEvent::Cache(_) => MetricCategory::Cache,
        }
    }
}

impl From<ApiRecord> for MetricEvent {
    fn from(record: ApiRecord) -> Self {
        MetricEvent::Api(record)
    }
}

impl From<RenderRecord> for MetricEvent {
    fn from(record: RenderRecord) -> Self {
        MetricEvent::Render(record)
    }
}

impl From<WebVitalRecord> for MetricEvent {
    fn from(record: WebVitalRecord) -> Self {
        MetricEvent::WebVital(record)
    }
}

impl From<NavigationRecord> for MetricEvent {
    fn from(record: NavigationRecord) -> Self {
        MetricEvent::Navigation(record)
    }
}

impl From<CacheRecord> for MetricEvent {
    fn from(record: CacheRecord) -> Self {
        MetricEvent::Cache(record)
    }
}

/// A recorded event with its capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Event payload
    pub fields: MetricEvent,
    /// Wall-clock capture time
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_names() {
        for category in MetricCategory::ALL {
            let parsed: MetricCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
            assert_eq!(
                serde_json::to_value(category).unwrap(),
                json!(category.as_str())
            );
        }
        assert!("vitals".parse::<MetricCategory>().is_err());
    }

    #[test]
    fn test_event_category() {
        let event: MetricEvent = CacheRecord { hit: true }.into();
        assert_eq!(event.category(), MetricCategory::Cache);

        let event: MetricEvent = WebVitalRecord {
            name: "LCP".into(),
            value: 1200.0,
        }
        .into();
        assert_eq!(event.category(), MetricCategory::WebVital);
    }

    #[test]
    fn test_api_record_wire_fields() {
        let event = MetricEvent::Api(ApiRecord {
            duration_ms: 12.5,
            success: true,
            cache_hit: false,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"duration": 12.5, "success": true, "cacheHit": false})
        );
    }

    #[test]
    fn test_untagged_decode_picks_matching_variant() {
        let nav: MetricEvent =
            serde_json::from_value(json!({"from": "/", "duration": 40.0})).unwrap();
        assert_eq!(nav.category(), MetricCategory::Navigation);

        let render: MetricEvent =
            serde_json::from_value(json!({"duration": 3.0, "phase": "mount"})).unwrap();
        assert_eq!(render.category(), MetricCategory::Render);
    }
}

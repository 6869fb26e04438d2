//! Aggregates and summary types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::ApiRecord;
use crate::clock::Timestamp;

/// Running counters for one API endpoint key
///
/// Counters are exact integers; rates are derived on read so they never
/// drift from the underlying counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiAggregate {
    /// Calls observed
    pub count: u64,
    /// Calls that succeeded
    pub success_count: u64,
    /// Calls that failed
    pub error_count: u64,
    /// Calls served from a cache
    pub cache_hits: u64,
    /// Sum of durations in milliseconds
    pub total_duration: f64,
}

impl ApiAggregate {
    /// Fold one record into the counters
    pub fn observe(&mut self, record: &ApiRecord) {
        self.count += 1;
        self.total_duration += record.duration_ms;
        if record.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        if record.cache_hit {
            self.cache_hits += 1;
        }
    }

    /// Mean duration in milliseconds
    pub fn average_duration(&self) -> f64 {
        ratio(self.total_duration, self.count)
    }

    /// Successful calls as a percentage
    pub fn success_rate(&self) -> f64 {
        ratio(self.success_count as f64, self.count) * 100.0
    }

    /// Cache-served calls as a percentage
    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits as f64, self.count) * 100.0
    }

    /// Snapshot for reporting
    pub fn to_stats(&self) -> ApiStats {
        ApiStats {
            calls: self.count,
            errors: self.error_count,
            total_duration: self.total_duration,
            average_duration: self.average_duration(),
            success_rate: self.success_rate(),
            cache_hit_rate: self.cache_hit_rate(),
        }
    }
}

fn ratio(numerator: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

/// Reported API endpoint statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    /// Calls observed
    pub calls: u64,
    /// Calls that failed
    pub errors: u64,
    /// Sum of durations in milliseconds
    pub total_duration: f64,
    /// Mean duration in milliseconds
    pub average_duration: f64,
    /// Successful calls as a percentage
    pub success_rate: f64,
    /// Cache-served calls as a percentage
    pub cache_hit_rate: f64,
}

/// Web vital quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VitalRating {
    /// At or under the "good" threshold
    Good,
    /// Between the two thresholds
    NeedsImprovement,
    /// Over the "poor" threshold
    Poor,
}

impl fmt::Display for VitalRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VitalRating::Good => write!(f, "good"),
            VitalRating::NeedsImprovement => write!(f, "needs-improvement"),
            VitalRating::Poor => write!(f, "poor"),
        }
    }
}

/// Good / poor thresholds for a named vital
fn vital_thresholds(name: &str) -> Option<(f64, f64)> {
    match name.to_ascii_uppercase().as_str() {
        "LCP" => Some((2500.0, 4000.0)),
        "FID" => Some((100.0, 300.0)),
        "INP" => Some((200.0, 500.0)),
        "CLS" => Some((0.1, 0.25)),
        "FCP" => Some((1800.0, 3000.0)),
        "TTFB" => Some((800.0, 1800.0)),
        _ => None,
    }
}

/// Rate a vital sample; unknown vitals are unrated
pub fn rate_vital(name: &str, value: f64) -> Option<VitalRating> {
    let (good, poor) = vital_thresholds(name)?;
    Some(if value <= good {
        VitalRating::Good
    } else if value <= poor {
        VitalRating::NeedsImprovement
    } else {
        VitalRating::Poor
    })
}

/// Most recent sample for one vital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSample {
    /// Sample value
    pub value: f64,
    /// Quality band; `None` for vitals without thresholds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<VitalRating>,
    /// When the sample was recorded
    pub timestamp: Timestamp,
}

/// Hit rate for one cache key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKeyStats {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that did not
    pub misses: u64,
    /// Percentage of lookups that hit
    pub hit_rate: f64,
}

/// Average duration over retained samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    /// Retained samples averaged
    pub samples: usize,
    /// Mean duration in milliseconds
    pub average_duration: f64,
}

impl DurationStats {
    pub(crate) fn from_durations(durations: impl IntoIterator<Item = f64>) -> Self {
        let (samples, total) = durations
            .into_iter()
            .fold((0usize, 0.0), |(n, sum), d| (n + 1, sum + d));
        Self {
            samples,
            average_duration: ratio(total, samples as u64),
        }
    }
}

/// Per-category rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Per endpoint key, over every call recorded
    pub api: BTreeMap<String, ApiStats>,
    /// Latest sample per vital name
    pub web_vitals: BTreeMap<String, VitalSample>,
    /// Per cache key, over retained records
    pub cache: BTreeMap<String, CacheKeyStats>,
    /// Per route, over retained records
    pub navigation: BTreeMap<String, DurationStats>,
    /// Per component, over retained records
    pub render: BTreeMap<String, DurationStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(duration_ms: f64, success: bool, cache_hit: bool) -> ApiRecord {
        ApiRecord {
            duration_ms,
            success,
            cache_hit,
        }
    }

    #[test]
    fn test_empty_aggregate_rates() {
        let agg = ApiAggregate::default();
        assert_eq!(agg.average_duration(), 0.0);
        assert_eq!(agg.success_rate(), 0.0);
        assert_eq!(agg.cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_aggregate_observe() {
        let mut agg = ApiAggregate::default();
        agg.observe(&api(100.0, true, true));
        agg.observe(&api(200.0, false, false));
        agg.observe(&api(300.0, true, false));
        agg.observe(&api(400.0, true, true));

        assert_eq!(agg.count, 4);
        assert_eq!(agg.error_count, 1);
        assert_eq!(agg.average_duration(), 250.0);
        assert_eq!(agg.success_rate(), 75.0);
        assert_eq!(agg.cache_hit_rate(), 50.0);
    }

    #[test]
    fn test_cache_hit_rate_exact_over_long_runs() {
        let mut agg = ApiAggregate::default();
        for i in 0..3000 {
            agg.observe(&api(1.0, true, i % 3 == 0));
        }
        assert_eq!(agg.cache_hits, 1000);
        assert!((agg.cache_hit_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_vital_thresholds() {
        assert_eq!(rate_vital("LCP", 2500.0), Some(VitalRating::Good));
        assert_eq!(rate_vital("LCP", 2501.0), Some(VitalRating::NeedsImprovement));
        assert_eq!(rate_vital("lcp", 4001.0), Some(VitalRating::Poor));
        assert_eq!(rate_vital("CLS", 0.05), Some(VitalRating::Good));
        assert_eq!(rate_vital("CLS", 0.2), Some(VitalRating::NeedsImprovement));
        assert_eq!(rate_vital("TTFB", 2000.0), Some(VitalRating::Poor));
        assert_eq!(rate_vital("XYZ", 1.0), None);
    }

    #[test]
    fn test_duration_stats() {
        let stats = DurationStats::from_durations([10.0, 20.0, 30.0]);
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.average_duration, 20.0);

        let empty = DurationStats::from_durations(std::iter::empty());
        assert_eq!(empty.samples, 0);
        assert_eq!(empty.average_duration, 0.0);
    }
}

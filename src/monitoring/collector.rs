//! Metrics Collector
//!
//! Bounded per-key history of metric events plus running API aggregates.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::record::{
    ApiRecord, CacheRecord, MetricCategory, MetricEvent, MetricRecord, NavigationRecord,
    RenderRecord, WebVitalRecord,
};
use super::stats::{
    rate_vital, ApiAggregate, ApiStats, CacheKeyStats, DurationStats, Summary, VitalSample,
};
use crate::clock::{cutoff_before, SharedClock, Timestamp};
use crate::error::Result;

/// Default ring-buffer size per (category, key)
pub const DEFAULT_MAX_HISTORY_PER_KEY: usize = 50;

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Records retained per (category, key)
    pub max_history_per_key: usize,
    /// Label stamped on exports; a session id is generated when absent
    pub context_label: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_history_per_key: DEFAULT_MAX_HISTORY_PER_KEY,
            context_label: None,
        }
    }
}

/// Full history export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// When the snapshot was taken
    pub timestamp: Timestamp,
    /// Session label of the collector that produced it
    pub context_label: String,
    /// Retained records by category, then by key, oldest first
    pub metrics: BTreeMap<MetricCategory, BTreeMap<String, Vec<MetricRecord>>>,
}

type History = BTreeMap<String, VecDeque<MetricRecord>>;

#[derive(Default)]
struct State {
    history: BTreeMap<MetricCategory, History>,
    api: BTreeMap<String, ApiAggregate>,
}

impl State {
    fn records(&self, category: MetricCategory) -> impl Iterator<Item = (&String, &VecDeque<MetricRecord>)> {
        self.history.get(&category).into_iter().flatten()
    }
}

/// Metrics collector
///
/// One instance is created at startup and shared (`Arc`) with every producer.
pub struct MetricsCollector {
    config: MetricsConfig,
    context_label: String,
    clock: SharedClock,
    state: RwLock<State>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new(mut config: MetricsConfig, clock: SharedClock) -> Self {
        config.max_history_per_key = config.max_history_per_key.max(1);
        let context_label = config
            .context_label
            .clone()
            .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));

        Self {
            config,
            context_label,
            clock,
            state: RwLock::new(State::default()),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Label stamped on exports
    pub fn context_label(&self) -> &str {
        &self.context_label
    }

    /// Append an event to the history for `key` under the event's category
    pub fn record(&self, key: impl Into<String>, event: impl Into<MetricEvent>) {
        let key = key.into();
        let event = event.into();
        let category = event.category();
        let record = MetricRecord {
            fields: event,
            timestamp: self.clock.now(),
        };

        let mut state = self.state.write();
        if let MetricEvent::Api(api) = &record.fields {
            state.api.entry(key.clone()).or_default().observe(api);
        }

        let buffer = state
            .history
            .entry(category)
            .or_default()
            .entry(key)
            .or_default();
        while buffer.len() >= self.config.max_history_per_key {
            buffer.pop_front();
        }
        buffer.push_back(record);
    }

    /// Record an outbound call
    pub fn record_api(&self, key: impl Into<String>, duration_ms: f64, success: bool, cache_hit: bool) {
        self.record(
            key,
            ApiRecord {
                duration_ms,
                success,
                cache_hit,
            },
        );
    }

    /// Record a component render
    pub fn record_render(&self, component: impl Into<String>, duration_ms: f64, phase: impl Into<String>) {
        self.record(
            component,
            RenderRecord {
                duration_ms,
                phase: phase.into(),
            },
        );
    }

    /// Record a web vital sample, keyed by vital name
    pub fn record_web_vital(&self, name: impl Into<String>, value: f64) {
        let name = name.into();
        self.record(name.clone(), WebVitalRecord { name, value });
    }

    /// Record a route transition, keyed by destination route
    pub fn record_navigation(&self, to: impl Into<String>, from: impl Into<String>, duration_ms: f64) {
        self.record(
            to,
            NavigationRecord {
                from: from.into(),
                duration_ms,
            },
        );
    }

    /// Record a cache lookup
    pub fn record_cache(&self, key: impl Into<String>, hit: bool) {
        self.record(key, CacheRecord { hit });
    }

    /// Retained records for (category, key), oldest first
    pub fn history(&self, category: MetricCategory, key: &str) -> Vec<MetricRecord> {
        self.state
            .read()
            .history
            .get(&category)
            .and_then(|keys| keys.get(key))
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of retained records for (category, key)
    pub fn record_count(&self, category: MetricCategory, key: &str) -> usize {
        self.state
            .read()
            .history
            .get(&category)
            .and_then(|keys| keys.get(key))
            .map_or(0, VecDeque::len)
    }

    /// Running statistics for an API endpoint key
    pub fn api_stats(&self, key: &str) -> Option<ApiStats> {
        self.state.read().api.get(key).map(ApiAggregate::to_stats)
    }

    /// Per-category rollup
    pub fn get_summary(&self) -> Summary {
        let state = self.state.read();
        let mut summary = Summary::default();

        for (key, agg) in &state.api {
            summary.api.insert(key.clone(), agg.to_stats());
        }

        for (key, buffer) in state.records(MetricCategory::WebVital) {
            let latest = buffer.iter().rev().find_map(|r| match &r.fields {
                MetricEvent::WebVital(v) => Some((v, r.timestamp)),
                _ => None,
            });
            if let Some((vital, timestamp)) = latest {
                summary.web_vitals.insert(
                    key.clone(),
                    VitalSample {
                        value: vital.value,
                        rating: rate_vital(&vital.name, vital.value),
                        timestamp,
                    },
                );
            }
        }

        for (key, buffer) in state.records(MetricCategory::Cache) {
            let hits = buffer
                .iter()
                .filter(|r| matches!(&r.fields, MetricEvent::Cache(c) if c.hit))
                .count() as u64;
            let total = buffer.len() as u64;
            summary.cache.insert(
                key.clone(),
                CacheKeyStats {
                    hits,
                    misses: total - hits,
                    hit_rate: if total == 0 {
                        0.0
                    } else {
                        hits as f64 / total as f64 * 100.0
                    },
                },
            );
        }

        for (key, buffer) in state.records(MetricCategory::Navigation) {
            let durations = buffer.iter().filter_map(|r| match &r.fields {
                MetricEvent::Navigation(n) => Some(n.duration_ms),
                _ => None,
            });
            summary
                .navigation
                .insert(key.clone(), DurationStats::from_durations(durations));
        }

        for (key, buffer) in state.records(MetricCategory::Render) {
            let durations = buffer.iter().filter_map(|r| match &r.fields {
                MetricEvent::Render(n) => Some(n.duration_ms),
                _ => None,
            });
            summary
                .render
                .insert(key.clone(), DurationStats::from_durations(durations));
        }

        summary
    }

    /// Export every retained record
    pub fn export_all(&self) -> MetricsSnapshot {
        let state = self.state.read();
        let metrics = state
            .history
            .iter()
            .map(|(category, keys)| {
                let keys = keys
                    .iter()
                    .map(|(key, buffer)| (key.clone(), buffer.iter().cloned().collect()))
                    .collect();
                (*category, keys)
            })
            .collect();

        MetricsSnapshot {
            timestamp: self.clock.now(),
            context_label: self.context_label.clone(),
            metrics,
        }
    }

    /// Export as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_all())?)
    }

    /// Drop records older than `max_age`, returning how many were removed.
    ///
    /// Keys left with no records are removed along with their aggregates.
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let cutoff = cutoff_before(self.clock.now(), max_age);
        let mut state = self.state.write();
        let mut removed = 0;
        let mut emptied_api_keys = Vec::new();

        for (category, keys) in state.history.iter_mut() {
            keys.retain(|key, buffer| {
                let before = buffer.len();
                buffer.retain(|r| r.timestamp >= cutoff);
                removed += before - buffer.len();
                if buffer.is_empty() && *category == MetricCategory::Api {
                    emptied_api_keys.push(key.clone());
                }
                !buffer.is_empty()
            });
        }
        state.history.retain(|_, keys| !keys.is_empty());
        for key in emptied_api_keys {
            state.api.remove(&key);
        }

        if removed > 0 {
            debug!(removed, cutoff = %cutoff, "Pruned aged metric records");
        }
        removed
    }

    /// Clear every category and aggregate
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.history.clear();
        state.api.clear();
        info!(context = %self.context_label, "Metrics reset");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn collector() -> (MetricsCollector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let config = MetricsConfig {
            context_label: Some("test-run".into()),
            ..Default::default()
        };
        (MetricsCollector::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_ring_buffer_keeps_most_recent() {
        let (metrics, _) = collector();
        for i in 0..60 {
            metrics.record_api("products/list", i as f64, true, false);
        }

        let history = metrics.history(MetricCategory::Api, "products/list");
        assert_eq!(history.len(), 50);
        let durations: Vec<f64> = history
            .iter()
            .map(|r| match &r.fields {
                MetricEvent::Api(a) => a.duration_ms,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(durations.first(), Some(&10.0));
        assert_eq!(durations.last(), Some(&59.0));
    }

    #[test]
    fn test_aggregates_cover_full_stream() {
        let (metrics, _) = collector();
        for i in 0..60 {
            metrics.record_api("products/list", 10.0, i % 4 != 0, false);
        }

        let stats = metrics.api_stats("products/list").unwrap();
        assert_eq!(stats.calls, 60);
        assert_eq!(stats.errors, 15);
        assert_eq!(stats.success_rate, 75.0);
        assert!((stats.average_duration * 60.0 - stats.total_duration).abs() < 1e-9);
    }

    #[test]
    fn test_keys_are_independent() {
        let (metrics, _) = collector();
        metrics.record_api("a/b", 1.0, true, false);
        metrics.record_cache("a/b", true);

        assert_eq!(metrics.record_count(MetricCategory::Api, "a/b"), 1);
        assert_eq!(metrics.record_count(MetricCategory::Cache, "a/b"), 1);
        assert_eq!(metrics.record_count(MetricCategory::Render, "a/b"), 0);
    }

    #[test]
    fn test_summary_latest_web_vital() {
        let (metrics, clock) = collector();
        metrics.record_web_vital("LCP", 5000.0);
        clock.advance(Duration::from_secs(1));
        metrics.record_web_vital("LCP", 1800.0);
        metrics.record_web_vital("CLS", 0.3);

        let summary = metrics.get_summary();
        let lcp = &summary.web_vitals["LCP"];
        assert_eq!(lcp.value, 1800.0);
        assert_eq!(lcp.rating, Some(crate::monitoring::VitalRating::Good));
        assert_eq!(summary.web_vitals["CLS"].value, 0.3);
    }

    #[test]
    fn test_summary_cache_navigation_render() {
        let (metrics, _) = collector();
        metrics.record_cache("products_{}", true);
        metrics.record_cache("products_{}", true);
        metrics.record_cache("products_{}", false);
        metrics.record_cache("products_{}", true);
        metrics.record_navigation("/catalog", "/", 100.0);
        metrics.record_navigation("/catalog", "/cart", 300.0);
        metrics.record_render("ProductGrid", 8.0, "mount");
        metrics.record_render("ProductGrid", 4.0, "update");

        let summary = metrics.get_summary();
        let cache = &summary.cache["products_{}"];
        assert_eq!((cache.hits, cache.misses), (3, 1));
        assert_eq!(cache.hit_rate, 75.0);
        assert_eq!(summary.navigation["/catalog"].average_duration, 200.0);
        assert_eq!(summary.render["ProductGrid"].samples, 2);
        assert_eq!(summary.render["ProductGrid"].average_duration, 6.0);
    }

    #[test]
    fn test_prune_older_than() {
        let (metrics, clock) = collector();
        metrics.record_api("old/call", 5.0, true, false);
        metrics.record_cache("k", false);
        clock.advance(Duration::from_secs(120));
        metrics.record_cache("k", true);

        let removed = metrics.prune_older_than(Duration::from_secs(60));
        assert_eq!(removed, 2);
        assert_eq!(metrics.record_count(MetricCategory::Api, "old/call"), 0);
        assert!(metrics.api_stats("old/call").is_none());
        assert_eq!(metrics.record_count(MetricCategory::Cache, "k"), 1);

        let snapshot = metrics.export_all();
        assert!(!snapshot.metrics.contains_key(&MetricCategory::Api));
    }

    #[test]
    fn test_prune_with_unbounded_age_keeps_everything() {
        let (metrics, clock) = collector();
        metrics.record_api("a/b", 1.0, true, false);
        clock.advance(Duration::from_secs(3600));
        metrics.record_cache("k", true);

        assert_eq!(metrics.prune_older_than(Duration::MAX), 0);
        assert_eq!(metrics.prune_older_than(Duration::from_secs(u64::MAX)), 0);
        assert_eq!(metrics.record_count(MetricCategory::Api, "a/b"), 1);
        assert_eq!(metrics.record_count(MetricCategory::Cache, "k"), 1);
    }

    #[test]
    fn test_reset() {
        let (metrics, _) = collector();
        metrics.record_api("a/b", 1.0, true, true);
        metrics.record_web_vital("FID", 50.0);
        metrics.reset();

        assert!(metrics.export_all().metrics.is_empty());
        assert!(metrics.api_stats("a/b").is_none());
        assert_eq!(metrics.get_summary(), Summary::default());
    }

    #[test]
    fn test_export_shape() {
        let (metrics, _) = collector();
        metrics.record_api("products/list", 12.0, true, false);

        let value = serde_json::to_value(metrics.export_all()).unwrap();
        assert_eq!(value["contextLabel"], "test-run");
        assert!(value["timestamp"].is_string());
        let record = &value["metrics"]["api"]["products/list"][0];
        assert_eq!(record["fields"]["duration"], 12.0);
        assert_eq!(record["fields"]["success"], true);
        assert_eq!(record["fields"]["cacheHit"], false);
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn test_export_json_decodes() {
        let (metrics, _) = collector();
        metrics.record_navigation("/catalog", "/", 12.0);
        metrics.record_render("Header", 1.5, "mount");

        let json = metrics.export_json().unwrap();
        let snapshot: MetricsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, metrics.export_all());
    }

    #[test]
    fn test_generated_context_label() {
        let clock = Arc::new(ManualClock::at_epoch());
        let metrics = MetricsCollector::new(MetricsConfig::default(), clock);
        assert!(metrics.context_label().starts_with("session-"));
    }

    #[test]
    fn test_concurrent_recording() {
        use std::thread;

        let clock = Arc::new(ManualClock::at_epoch());
        let metrics = Arc::new(MetricsCollector::new(MetricsConfig::default(), clock));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_api("shared/key", 1.0, true, false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.api_stats("shared/key").unwrap().calls, 400);
        assert_eq!(metrics.record_count(MetricCategory::Api, "shared/key"), 50);
    }
}

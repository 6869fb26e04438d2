//! Performance Metrics
//!
//! Typed metric events collected into bounded per-key histories, with
//! running aggregates for outbound calls.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Metrics Collector                               │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐  │
//! │  │ Api / Cache    │  │ Render / Nav   │  │ Web Vitals                 │  │
//! │  │ (interceptor)  │  │ (UI callers)   │  │ (rated good/poor)          │  │
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘  │
//! │          │                   │                        │                  │
//! │          └───────────────────┴────────────────────────┘                  │
//! │                              │                                           │
//! │             ┌─────────────────────────────────────┐                      │
//! │             │ Ring buffer per (category, key)     │                      │
//! │             │ + exact API counters                │                      │
//! │             └─────────────────────────────────────┘                      │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Memory stays bounded by the per-key ring buffer; `prune_older_than`
//! additionally bounds it by age in long-running sessions.

mod collector;
mod record;
mod stats;

pub use collector::{MetricsCollector, MetricsConfig, MetricsSnapshot, DEFAULT_MAX_HISTORY_PER_KEY};
pub use record::{
    ApiRecord, CacheRecord, MetricCategory, MetricEvent, MetricRecord, NavigationRecord,
    RenderRecord, WebVitalRecord,
};
pub use stats::{
    rate_vital, ApiAggregate, ApiStats, CacheKeyStats, DurationStats, Summary, VitalRating,
    VitalSample,
};

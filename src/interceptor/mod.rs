//! Call Interceptor
//!
//! Wraps outbound async calls, timing each one and reporting the outcome to
//! the [`MetricsCollector`] under a low-cardinality endpoint key.
//!
//! Callers opt in explicitly: a call is measured only when it is routed
//! through [`CallInterceptor::intercept`] (or a [`MeteredHttpClient`]).
//!
//! Outcomes:
//! - `Ok` → recorded with the response's success and cache-hit flags
//! - `Err` → recorded with `success = false`, error returned unchanged
//! - aborted (token cancelled or future dropped) → not recorded
//!
//! Plain data responses (strings, numbers, collections, JSON) implement
//! [`CallResponse`] as always-successful, never-cached. Wrap any other value
//! in [`ServedFromCache`] to intercept it.

mod http;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::clock::{span_ms, SharedClock};
use crate::monitoring::MetricsCollector;

pub use http::{HttpResponse, MeteredHttpClient, ReqwestTransport, Transport};

/// Outcome flags of a completed call
pub trait CallResponse {
    /// Whether the call succeeded at the application level
    fn is_success(&self) -> bool {
        true
    }

    /// Whether the response was served from a cache
    fn served_from_cache(&self) -> bool {
        false
    }
}

macro_rules! plain_response {
    ($($ty:ty),* $(,)?) => {
        $(impl CallResponse for $ty {})*
    };
}

plain_response!(
    (), bool, String, serde_json::Value,
    u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64,
);

impl<T> CallResponse for Vec<T> {}

impl<T> CallResponse for Option<T> {}

impl<K, V, S> CallResponse for HashMap<K, V, S> {}

impl<K, V> CallResponse for BTreeMap<K, V> {}

impl<T: CallResponse + ?Sized> CallResponse for Box<T> {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }

    fn served_from_cache(&self) -> bool {
        (**self).served_from_cache()
    }
}

impl<T: CallResponse + ?Sized> CallResponse for Arc<T> {
    fn is_success(&self) -> bool {
        (**self).is_success()
    }

    fn served_from_cache(&self) -> bool {
        (**self).served_from_cache()
    }
}

/// Value tagged with an explicit "served from cache" marker
#[derive(Debug, Clone, PartialEq)]
pub struct ServedFromCache<T> {
    /// Wrapped response
    pub value: T,
    /// Whether `value` came from a cache rather than the origin
    pub from_cache: bool,
}

impl<T> ServedFromCache<T> {
    /// Wrap `value`
    pub fn new(value: T, from_cache: bool) -> Self {
        Self { value, from_cache }
    }

    /// Unwrap the response
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> CallResponse for ServedFromCache<T> {
    fn served_from_cache(&self) -> bool {
        self.from_cache
    }
}

/// Failure of a cancellable call
#[derive(Debug, Error)]
pub enum CallError<E: fmt::Debug + fmt::Display> {
    /// Caller cancelled the call before it completed; nothing was recorded
    #[error("call aborted")]
    Aborted,

    /// The call itself failed; recorded with `success = false`
    #[error("call failed: {0}")]
    Failed(E),
}

impl<E: fmt::Debug + fmt::Display> CallError<E> {
    /// Whether the call was cancelled rather than failed
    pub fn is_aborted(&self) -> bool {
        matches!(self, CallError::Aborted)
    }
}

/// Reduce a call's URL or path to a stable metrics key.
///
/// Scheme, host, query and fragment are dropped and the last two non-empty
/// path segments are kept, so `https://api.example.com/v1/products/42?x=1`
/// becomes `products/42`. A target with no path yields `/`.
pub fn endpoint_key(resource: &str) -> String {
    let path = match reqwest::Url::parse(resource) {
        Ok(url) => url.path().to_string(),
        Err(_) => resource
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    segments[segments.len().saturating_sub(2)..].join("/")
}

/// Measures outbound calls and reports them to the metrics collector
#[derive(Clone)]
pub struct CallInterceptor {
    metrics: Arc<MetricsCollector>,
    clock: SharedClock,
}

impl CallInterceptor {
    /// Create an interceptor reporting to `metrics`
    pub fn new(metrics: Arc<MetricsCollector>, clock: SharedClock) -> Self {
        Self { metrics, clock }
    }

    /// Collector receiving the measurements
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Run `call`, record one `api` metric for `resource`, and return the
    /// call's result unchanged.
    ///
    /// Dropping the returned future before it completes records nothing.
    #[instrument(skip(self, call))]
    pub async fn intercept<T, E, F>(&self, resource: &str, call: F) -> Result<T, E>
    where
        T: CallResponse,
        F: Future<Output = Result<T, E>>,
    {
        let key = endpoint_key(resource);
        let start = self.clock.monotonic();
        let outcome = call.await;
        let duration_ms = span_ms(start, self.clock.monotonic());

        let (success, cache_hit) = match &outcome {
            Ok(response) => (response.is_success(), response.served_from_cache()),
            Err(_) => (false, false),
        };
        debug!(endpoint = %key, duration_ms, success, cache_hit, "Call completed");
        self.metrics.record_api(key, duration_ms, success, cache_hit);

        outcome
    }

    /// Like [`intercept`](Self::intercept), but abandons the call when
    /// `cancel` fires. An aborted call is reported as [`CallError::Aborted`]
    /// and leaves no metric behind.
    #[instrument(skip(self, cancel, call))]
    pub async fn intercept_cancellable<T, E, F>(
        &self,
        resource: &str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, CallError<E>>
    where
        T: CallResponse,
        E: fmt::Debug + fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(resource, "Call aborted");
                Err(CallError::Aborted)
            }
            outcome = self.intercept(resource, call) => outcome.map_err(CallError::Failed),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

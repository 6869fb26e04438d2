//! Metered HTTP client
//!
//! A reqwest-backed client whose requests always pass through the
//! [`CallInterceptor`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AGE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{CallError, CallInterceptor, CallResponse};
use crate::error::{Error, Result};

/// Cache-status header set by CDNs and reverse proxies
const X_CACHE: &str = "x-cache";

/// Whether response headers mark the body as served from an HTTP cache
fn cache_hit_from_headers(headers: &HeaderMap) -> bool {
    let x_cache_hit = headers
        .get(X_CACHE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_uppercase().starts_with("HIT"))
        .unwrap_or(false);

    let aged = headers
        .get(AGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|age| age > 0)
        .unwrap_or(false);

    x_cache_hit || aged
}

impl CallResponse for reqwest::Response {
    fn is_success(&self) -> bool {
        self.status().is_success()
    }

    fn served_from_cache(&self) -> bool {
        cache_hit_from_headers(self.headers())
    }
}

/// Fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Body decoded as text
    pub body: String,
}

impl HttpResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

impl CallResponse for HttpResponse {
    fn is_success(&self) -> bool {
        self.status.is_success()
    }

    fn served_from_cache(&self) -> bool {
        cache_hit_from_headers(&self.headers)
    }
}

/// Performs the raw request
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`; non-2xx statuses are responses, not errors
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// reqwest transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// HTTP client whose every request is measured
pub struct MeteredHttpClient<T = ReqwestTransport> {
    transport: T,
    interceptor: CallInterceptor,
}

impl MeteredHttpClient<ReqwestTransport> {
    /// Create a reqwest-backed client
    pub fn new(interceptor: CallInterceptor, timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(timeout)?, interceptor))
    }
}

impl<T: Transport> MeteredHttpClient<T> {
    /// Create a client over a custom transport
    pub fn with_transport(transport: T, interceptor: CallInterceptor) -> Self {
        Self {
            transport,
            interceptor,
        }
    }

    /// Interceptor measuring this client's calls
    pub fn interceptor(&self) -> &CallInterceptor {
        &self.interceptor
    }

    /// GET `url`. Non-2xx responses are returned, and recorded as failures.
    #[instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.interceptor.intercept(url, self.transport.get(url)).await
    }

    /// GET `url`, abandoning the request when `cancel` fires
    #[instrument(skip(self, cancel))]
    pub async fn get_cancellable(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<HttpResponse, CallError<Error>> {
        self.interceptor
            .intercept_cancellable(url, cancel, self.transport.get(url))
            .await
    }

    /// GET `url` and decode a 2xx JSON body
    pub async fn get_json<V: DeserializeOwned>(&self, url: &str) -> Result<V> {
        let response = self.get(url).await?;
        if !response.status.is_success() {
            return Err(Error::Internal(format!(
                "GET {} returned {}",
                url, response.status
            )));
        }
        response.json()
    }
}

// =============================================================================
// Tests
// =============================================================================

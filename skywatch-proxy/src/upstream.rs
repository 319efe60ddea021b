//! Upstream HTTP client
//!
//! One outbound GET per call with browser-like headers, a hard timeout and
//! a cancellation token. No retries at this layer.
//!
//! Losing the timeout/cancellation race drops the in-flight request future,
//! which closes the underlying connection instead of letting it run on in
//! the background.

use async_trait::async_trait;
use axum::body::Bytes;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use skywatch_common::config::UpstreamConfig;

/// Upstream fetch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, DNS or body transfer failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// No complete response within the budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response
    #[error("HTTP error {0}")]
    HttpError(u16),

    /// Abandoned by the caller before completion
    #[error("Request cancelled")]
    Cancelled,
}

/// One outbound request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Per-call headers, sent in addition to the client's fixed set
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw payload fetcher
///
/// The cache layer depends on this trait rather than on [`UpstreamClient`]
/// so tests can substitute a counting or failing fetcher.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError>;
}

/// reqwest-backed upstream client
pub struct UpstreamClient {
    http_client: reqwest::Client,
    /// Politeness limiter keyed by upstream host
    rate_limiter: DefaultKeyedRateLimiter<String>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::keyed(Quota::per_second(per_second)),
        })
    }

    async fn send(&self, request: &FetchRequest) -> Result<Bytes, FetchError> {
        if let Some(host) = host_of(&request.url) {
            self.rate_limiter.until_key_ready(&host).await;
        }

        let mut builder = self.http_client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(e, request.timeout))
    }
}

#[async_trait]
impl Fetch for UpstreamClient {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let started = Instant::now();
        tracing::debug!(url = %request.url, "Fetching upstream");

        let result = tokio::select! {
            result = self.send(request) => result,
            _ = tokio::time::sleep(request.timeout) => Err(FetchError::Timeout(request.timeout)),
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(body) => tracing::debug!(
                url = %request.url,
                bytes = body.len(),
                elapsed_ms,
                "Upstream fetch complete"
            ),
            Err(e) => tracing::warn!(
                url = %request.url,
                error = %e,
                elapsed_ms,
                "Upstream fetch failed"
            ),
        }

        result
    }
}

fn classify_reqwest_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::NetworkError(error.to_string())
    }
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

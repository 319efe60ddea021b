//! skywatch-proxy library
//!
//! Caching proxy in front of public aircraft-position feeds: passthrough
//! endpoints per upstream plus a merged, normalized aggregate.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod classify;
pub mod error;
pub mod parsers;
pub mod sources;
pub mod upstream;

pub use crate::error::{ApiError, ApiResult};

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use skywatch_common::config::{SourcesConfig, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::aggregator::Aggregator;
use crate::cache::FeedCache;
use crate::classify::{ClassificationPolicy, HeuristicPolicy};
use crate::upstream::Fetch;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub feeds: Arc<FeedCache>,
    pub aggregator: Arc<Aggregator>,
    pub sources: Arc<SourcesConfig>,
    pub upstream_timeout: Duration,
    /// Server startup timestamp for uptime calculation
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State with the default heuristic classification policy
    pub fn new(config: &TomlConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self::with_policy(config, fetcher, Arc::new(HeuristicPolicy))
    }

    pub fn with_policy(
        config: &TomlConfig,
        fetcher: Arc<dyn Fetch>,
        policy: Arc<dyn ClassificationPolicy>,
    ) -> Self {
        let feeds = Arc::new(FeedCache::new(
            fetcher,
            config.cache.ttl(),
            config.cache.sweep_interval(),
        ));
        let upstream_timeout = config.upstream.timeout();
        let aggregator = Arc::new(Aggregator::new(
            Arc::clone(&feeds),
            config.sources.clone(),
            upstream_timeout,
            policy,
        ));

        Self {
            feeds,
            aggregator,
            sources: Arc::new(config.sources.clone()),
            upstream_timeout,
            startup_time: Utc::now(),
        }
    }

    /// `Cache-Control` for successful data responses, matching the cache TTL
    pub fn cache_control(&self) -> HeaderValue {
        let max_age = self.feeds.ttl().as_secs().max(1);
        HeaderValue::from_str(&format!("public, max-age={}", max_age))
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=1"))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::feed_routes())
        .merge(api::aggregate_routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

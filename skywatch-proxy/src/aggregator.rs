//! Multi-source aggregation
//!
//! Fetches every requested source concurrently, parses each payload with
//! its own schema and concatenates the results in request order. A source
//! that fails contributes nothing; the call only fails when every requested
//! source did.

use futures::future::join_all;
use serde::Serialize;
use skywatch_common::config::SourcesConfig;
use skywatch_common::{BoundingBox, Track};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::FeedCache;
use crate::classify::ClassificationPolicy;
use crate::sources::SourceId;
use crate::upstream::FetchError;

/// Aggregate call failures
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("All {0} requested sources failed")]
    AllSourcesFailed(usize),
}

/// Why one source contributed nothing
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Request(#[from] skywatch_common::Error),
}

/// Merged tracks, serialized as the `/api/aggregate` body
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    pub count: usize,
    pub flights: Vec<Track>,
}

impl Aggregate {
    fn new(flights: Vec<Track>) -> Self {
        Self {
            count: flights.len(),
            flights,
        }
    }
}

/// Outcome of one source within an aggregate call
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceId,
    /// Tracks contributed after filtering
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate plus the per-source breakdown
#[derive(Debug, Clone)]
pub struct DetailedAggregate {
    pub aggregate: Aggregate,
    pub sources: Vec<SourceReport>,
}

impl DetailedAggregate {
    pub fn all_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(|s| s.error.is_some())
    }
}

/// Concurrent fetch + parse + merge over the enabled sources
pub struct Aggregator {
    feeds: Arc<FeedCache>,
    urls: SourcesConfig,
    timeout: Duration,
    policy: Arc<dyn ClassificationPolicy>,
}

impl Aggregator {
    pub fn new(
        feeds: Arc<FeedCache>,
        urls: SourcesConfig,
        timeout: Duration,
        policy: Arc<dyn ClassificationPolicy>,
    ) -> Self {
        Self {
            feeds,
            urls,
            timeout,
            policy,
        }
    }

    /// Merge `sources`, optionally restricted to `bbox`
    pub async fn aggregate(
        &self,
        sources: &[SourceId],
        bbox: Option<BoundingBox>,
    ) -> Result<Aggregate, AggregateError> {
        let detailed = self.aggregate_detailed(sources, bbox).await;
        if detailed.all_failed() {
            return Err(AggregateError::AllSourcesFailed(detailed.sources.len()));
        }
        Ok(detailed.aggregate)
    }

    /// Like [`aggregate`](Self::aggregate), reporting every source's outcome
    /// instead of failing
    pub async fn aggregate_detailed(
        &self,
        sources: &[SourceId],
        bbox: Option<BoundingBox>,
    ) -> DetailedAggregate {
        let mut requested: Vec<SourceId> = Vec::with_capacity(sources.len());
        for source in sources {
            if !requested.contains(source) {
                requested.push(*source);
            }
        }

        // Cancels every per-source token if this call is dropped mid-flight
        let call = CancellationToken::new();
        let _call_guard = call.clone().drop_guard();

        let start = Instant::now();
        let futures = requested.iter().map(|&source| {
            let cancel = call.child_token();
            async move {
                let result = self.fetch_source(source, bbox.as_ref(), &cancel).await;
                (source, result)
            }
        });
        let results = join_all(futures).await;

        let mut flights = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for (source, result) in results {
            match result {
                Ok(tracks) => {
                    let before = flights.len();
                    flights.extend(
                        tracks
                            .into_iter()
                            .filter(|track| bbox.map_or(true, |b| b.contains(track))),
                    );
                    reports.push(SourceReport {
                        source,
                        count: flights.len() - before,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(%source, error = %e, "Source failed, contributing no tracks");
                    reports.push(SourceReport {
                        source,
                        count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        debug!(
            sources = reports.len(),
            count = flights.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Aggregate complete"
        );

        DetailedAggregate {
            aggregate: Aggregate::new(flights),
            sources: reports,
        }
    }

    async fn fetch_source(
        &self,
        source: SourceId,
        bbox: Option<&BoundingBox>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Track>, SourceError> {
        let query = bbox.and_then(|b| source.area_query(b));
        let request = source.request(&self.urls, query.as_deref(), self.timeout)?;
        let key = source.cache_key(query.as_deref());

        let body = tokio::select! {
            result = self.feeds.get_or_fetch(&key, request, cancel) => result?,
            _ = tokio::time::sleep(self.timeout) => {
                cancel.cancel();
                return Err(FetchError::Timeout(self.timeout).into());
            }
        };

        // Undecodable payloads cost this source its tracks, like any other parse failure
        let Ok(text) = std::str::from_utf8(&body) else {
            debug!(%source, bytes = body.len(), "Payload is not UTF-8");
            return Ok(Vec::new());
        };

        Ok(source
            .schema()
            .parse(text, source.track_source(), self.policy.as_ref()))
    }
}

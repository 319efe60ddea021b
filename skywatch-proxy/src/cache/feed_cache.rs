//! Cached, coalesced upstream fetches
//!
//! Lookup order for a key: fresh cache entry, else join a pending flight,
//! else start one. Only successful payloads are cached.

use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{SingleFlight, TtlCache};
use crate::parsers::strip_guard;
use crate::upstream::{Fetch, FetchError, FetchRequest};

/// Raw payloads keyed by source + upstream query
pub struct FeedCache {
    cache: Arc<TtlCache<Bytes>>,
    flights: SingleFlight<Bytes, FetchError>,
    fetcher: Arc<dyn Fetch>,
}

impl FeedCache {
    pub fn new(fetcher: Arc<dyn Fetch>, ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(ttl, sweep_interval)),
            flights: SingleFlight::new(),
            fetcher,
        }
    }

    /// Payload for `key`, fetching `request` on a miss
    ///
    /// `cancel` abandons this caller's wait. The shared upstream request is
    /// dropped, and its connection closed, once no caller is waiting on it.
    pub async fn get_or_fetch(
        &self,
        key: &str,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        if let Some(body) = self.cache.get(key) {
            tracing::debug!(key, "Cache hit");
            return Ok(body);
        }

        let cache = Arc::clone(&self.cache);
        let fetcher = Arc::clone(&self.fetcher);
        let owned_key = key.to_string();

        let flight = self.flights.run(key, move || async move {
            // A flight that settled just before this one registered may have filled it
            if let Some(body) = cache.get(&owned_key) {
                return Ok(body);
            }

            tracing::debug!(key = %owned_key, url = %request.url, "Cache miss");
            let body = fetcher.fetch(&request, &CancellationToken::new()).await?;
            let body = clean_payload(body);
            cache.set(owned_key, body.clone());
            Ok(body)
        });

        tokio::select! {
            result = flight => result,
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.cache.ttl()
    }

    /// Number of cached payloads, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Stop the cache's background sweep
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}

/// Strip the anti-scraping guard and surrounding whitespace without
/// copying. Bodies that are not UTF-8 are cached as received.
fn clean_payload(body: Bytes) -> Bytes {
    let Ok(text) = std::str::from_utf8(&body) else {
        return body;
    };
    let cleaned = strip_guard(text);
    if cleaned.len() == body.len() {
        body
    } else if cleaned.is_empty() {
        Bytes::new()
    } else {
        body.slice_ref(cleaned.as_bytes())
    }
}

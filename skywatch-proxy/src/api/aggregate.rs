//! Aggregate and stats endpoints

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skywatch_common::BoundingBox;

use crate::aggregator::SourceReport;
use crate::error::{ApiError, ApiResult};
use crate::sources::SourceId;
use crate::AppState;

/// Query parameters shared by `/api/aggregate` and `/api/stats`
#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    /// `west,south,east,north`
    pub bbox: Option<String>,
    /// Comma-separated source names; defaults to fr24, adsb, opensky
    pub sources: Option<String>,
}

impl AggregateQuery {
    fn bbox(&self) -> ApiResult<Option<BoundingBox>> {
        match self.bbox.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<BoundingBox>()
                .map(Some)
                .map_err(|e| ApiError::InvalidBbox(e.to_string())),
        }
    }

    fn sources(&self) -> ApiResult<Vec<SourceId>> {
        match self.sources.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(SourceId::DEFAULT_AGGREGATE.to_vec()),
            Some(list) => {
                SourceId::parse_list(list).map_err(|e| ApiError::InvalidSources(e.to_string()))
            }
        }
    }
}

/// GET /api/aggregate
///
/// Merged tracks from every requested source. Fails only when all of them do.
pub async fn aggregate(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> ApiResult<Response> {
    let bbox = query.bbox()?;
    let sources = query.sources()?;

    let aggregate = state.aggregator.aggregate(&sources, bbox).await?;

    Ok((
        [(header::CACHE_CONTROL, state.cache_control())],
        Json(aggregate),
    )
        .into_response())
}

/// Stats response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Tracks across all sources after filtering
    pub total: usize,
    /// Payloads currently held by the cache
    pub cached_payloads: usize,
    pub sources: Vec<SourceReport>,
}

/// GET /api/stats
///
/// Per-source counts and failures for the same query `/api/aggregate` takes.
/// Always 200, even when every source failed.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> ApiResult<Response> {
    let bbox = query.bbox()?;
    let sources = query.sources()?;

    let detailed = state.aggregator.aggregate_detailed(&sources, bbox).await;

    Ok((
        [(header::CACHE_CONTROL, state.cache_control())],
        Json(StatsResponse {
            total: detailed.aggregate.count,
            cached_payloads: state.feeds.len(),
            sources: detailed.sources,
        }),
    )
        .into_response())
}

/// Build aggregate routes
pub fn aggregate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/aggregate", get(aggregate))
        .route("/api/stats", get(stats))
}

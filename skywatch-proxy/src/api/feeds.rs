//! Single-source passthrough endpoints
//!
//! Each route serves the cached upstream body verbatim (guard prefix
//! removed). Query parameters are forwarded to the upstream untouched.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::sources::SourceId;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct Fr24Query {
    /// Opaque upstream bounds string
    pub bounds: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenSkyQuery {
    /// `west,south,east,north`
    pub bbox: Option<String>,
}

/// GET /api/fr24
pub async fn fr24(State(state): State<AppState>, Query(query): Query<Fr24Query>) -> ApiResult<Response> {
    passthrough(&state, SourceId::Fr24, query.bounds).await
}

/// GET /api/adsb/mil
pub async fn adsb_mil(State(state): State<AppState>) -> ApiResult<Response> {
    passthrough(&state, SourceId::AdsbMil, None).await
}

/// GET /api/adsb/ladd
pub async fn adsb_ladd(State(state): State<AppState>) -> ApiResult<Response> {
    passthrough(&state, SourceId::AdsbLadd, None).await
}

/// GET /api/opensky
pub async fn opensky(
    State(state): State<AppState>,
    Query(query): Query<OpenSkyQuery>,
) -> ApiResult<Response> {
    passthrough(&state, SourceId::OpenSky, query.bbox).await
}

async fn passthrough(state: &AppState, source: SourceId, query: Option<String>) -> ApiResult<Response> {
    let query = query.filter(|q| !q.trim().is_empty());
    let request = source
        .request(&state.sources, query.as_deref(), state.upstream_timeout)
        .map_err(|e| ApiError::source_failed(source, e))?;
    let key = source.cache_key(query.as_deref());

    // Client disconnect drops this future, which cancels the wait
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let body = state
        .feeds
        .get_or_fetch(&key, request, &cancel)
        .await
        .map_err(|e| ApiError::fetch(source, e))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CACHE_CONTROL, state.cache_control()),
        ],
        Body::from(body),
    )
        .into_response())
}

/// Build passthrough routes
pub fn feed_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fr24", get(fr24))
        .route("/api/adsb/mil", get(adsb_mil))
        .route("/api/adsb/ladd", get(adsb_ladd))
        .route("/api/opensky", get(opensky))
}

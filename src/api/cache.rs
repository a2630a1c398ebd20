use axum::extract::State;
use axum::Json;

use super::{api_error, ApiError};
use crate::clustering;
use crate::models::{CacheReport, CacheRequest, CacheStatusResponse, CachedPoint};
use crate::state::AppState;

/// POST /api/umap-cache - Embed all participants, project to 2D + 50D, and
/// replace the cache
pub async fn generate_cache(
    State(state): State<AppState>,
    Json(req): Json<CacheRequest>,
) -> Result<Json<CacheReport>, ApiError> {
    let report = clustering::generate_umap_cache(
        state.participants.as_ref(),
        state.embedder.clone(),
        state.cache.as_ref(),
        &state.config.clustering,
        &req,
    )
    .await
    .map_err(api_error)?;
    Ok(Json(report))
}

/// GET /api/umap-cache/status
pub async fn cache_status(
    State(state): State<AppState>,
) -> Result<Json<CacheStatusResponse>, ApiError> {
    clustering::cache_status(state.cache.as_ref())
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /api/umap-cache/points - 2D coordinates for the scatter plot
pub async fn cached_points(
    State(state): State<AppState>,
) -> Result<Json<Vec<CachedPoint>>, ApiError> {
    clustering::cached_points(state.cache.as_ref())
        .await
        .map(Json)
        .map_err(api_error)
}

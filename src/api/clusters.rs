use axum::extract::{Query, State};
use axum::Json;

use super::{api_error, ApiError};
use crate::clustering;
use crate::llm::insights::generate_cluster_insights;
use crate::models::{ClusterInsight, ClusterSnapshot, ClusteringRequest, ClusteringResult, InsightsRequest};
use crate::state::AppState;

/// POST /api/clusters/run - HDBSCAN over the cached projection
pub async fn run_clustering(
    State(state): State<AppState>,
    Json(req): Json<ClusteringRequest>,
) -> Result<Json<ClusteringResult>, ApiError> {
    clustering::run_clustering_on_cache(state.cache.as_ref(), &state.config.clustering, &req)
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /api/clusters/cached?minClusterSize=&minSamples= - Latest snapshot,
/// `null` when absent or computed with other parameters
pub async fn cached_clusters(
    State(state): State<AppState>,
    Query(req): Query<ClusteringRequest>,
) -> Result<Json<Option<ClusterSnapshot>>, ApiError> {
    clustering::get_cached_cluster_results(state.cache.as_ref(), &req)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /api/clusters/insights - Name and describe each cluster
pub async fn cluster_insights(
    State(state): State<AppState>,
    Json(req): Json<InsightsRequest>,
) -> Json<Vec<ClusterInsight>> {
    let insights = generate_cluster_insights(
        state.generator.as_ref(),
        &req.cluster_points,
        state.config.llm.temperature,
    )
    .await;
    Json(insights)
}

use axum::extract::State;
use axum::Json;

use super::{api_error, ApiError};
use crate::models::{SimilarParticipant, SimilarRequest};
use crate::search::search_similar_public;
use crate::state::AppState;

/// POST /api/participants/similar - Participants similar to an existing one
/// (`participantId`) or to a free-text `query`
pub async fn similar(
    State(state): State<AppState>,
    Json(req): Json<SimilarRequest>,
) -> Result<Json<Vec<SimilarParticipant>>, ApiError> {
    search_similar_public(
        state.participants.as_ref(),
        state.index.as_ref(),
        &state.config.index.namespace,
        &req,
    )
    .await
    .map(Json)
    .map_err(api_error)
}

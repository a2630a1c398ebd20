use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::{api_error, ApiError};
use crate::consolidate::generate_participant_text;
use crate::indexing::{index_participant, reindex_all, IndexOutcome};
use crate::models::{ReindexReport, ReindexRequest};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTextResponse {
    pub participant_id: String,
    pub text: String,
    pub last_updated: i64,
}

/// POST /api/participants/{id}/index - Upsert one participant into the RAG index
pub async fn index_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IndexOutcome>, ApiError> {
    index_participant(
        state.participants.as_ref(),
        state.index.as_ref(),
        &state.config.index.namespace,
        &id,
    )
    .await
    .map(Json)
    .map_err(api_error)
}

/// POST /api/participants/reindex - Index every participant
pub async fn reindex(
    State(state): State<AppState>,
    Json(req): Json<ReindexRequest>,
) -> Result<Json<ReindexReport>, ApiError> {
    reindex_all(
        state.participants.as_ref(),
        state.index.as_ref(),
        &state.config.index.namespace,
        req.limit,
    )
    .await
    .map(Json)
    .map_err(api_error)
}

/// GET /api/participants/{id}/text - The consolidated text that gets embedded
pub async fn participant_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantTextResponse>, ApiError> {
    let consolidated = generate_participant_text(state.participants.as_ref(), &id)
        .await
        .map_err(api_error)?;
    Ok(Json(ParticipantTextResponse {
        participant_id: id,
        text: consolidated.text,
        last_updated: consolidated.last_updated,
    }))
}

//! Keeps the RAG index in step with participant records.

use serde::Serialize;

use crate::consolidate::{generate_participant_text, has_indexable_content};
use crate::error::{CoreError, Result};
use crate::models::{EntryMetadata, ParticipantMetadata, ReindexReport};
use crate::search::vector::{IndexEntryInput, VectorIndex};
use crate::store::ParticipantStore;

pub const NO_DATA_REASON: &str = "No data to index";

/// Result of indexing a single participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    #[serde(rename_all = "camelCase")]
    Indexed { entry_id: String, changed: bool },
    Skipped { reason: String },
}

/// Index key of a participant's entry.
pub fn entry_key(participant_id: &str) -> String {
    format!("participant-{participant_id}")
}

/// Upsert one participant's consolidated text into `namespace`.
pub async fn index_participant(
    participants: &dyn ParticipantStore,
    index: &dyn VectorIndex,
    namespace: &str,
    participant_id: &str,
) -> Result<IndexOutcome> {
    let consolidated = generate_participant_text(participants, participant_id).await?;
    if !has_indexable_content(&consolidated.text) {
        tracing::debug!(participant_id, "Nothing to index");
        return Ok(IndexOutcome::Skipped {
            reason: NO_DATA_REASON.to_string(),
        });
    }

    let metadata = ParticipantMetadata::from_participant(
        &consolidated.participant,
        consolidated.last_updated,
    );
    let outcome = index
        .add(IndexEntryInput {
            namespace: namespace.to_string(),
            key: entry_key(participant_id),
            text: consolidated.text,
            metadata: EntryMetadata::Participant(metadata),
        })
        .await
        .map_err(|e| CoreError::external("vector index", e))?;

    tracing::info!(
        participant_id,
        namespace,
        entry_id = %outcome.entry_id,
        changed = outcome.changed,
        "Indexed participant"
    );
    Ok(IndexOutcome::Indexed {
        entry_id: outcome.entry_id,
        changed: outcome.changed,
    })
}

/// Index every participant (newest first, up to `limit`).
///
/// One participant failing does not stop the run; it is logged and counted.
pub async fn reindex_all(
    participants: &dyn ParticipantStore,
    index: &dyn VectorIndex,
    namespace: &str,
    limit: Option<usize>,
) -> Result<ReindexReport> {
    let ids = participants.list_participant_ids(limit).await?;
    let mut report = ReindexReport::default();

    for id in &ids {
        match index_participant(participants, index, namespace, id).await {
            Ok(IndexOutcome::Indexed { .. }) => report.indexed += 1,
            Ok(IndexOutcome::Skipped { .. }) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(participant_id = %id, error = %e, "Failed to index participant");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        namespace,
        indexed = report.indexed,
        skipped = report.skipped,
        failed = report.failed,
        "Reindex complete"
    );
    Ok(report)
}

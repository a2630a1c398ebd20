//! "Participants similar to X" over the RAG index.
//!
//! The index returns chunk-level matches, so one participant can surface
//! several times. Results are collapsed to one row per entry carrying the
//! best chunk score, ranked, and decorated with highlight snippets.

use std::collections::{HashMap, HashSet};

use crate::consolidate::generate_participant_text;
use crate::error::{CoreError, Result};
use crate::models::{SimilarParticipant, SimilarRequest};
use crate::search::snippet::{extract_highlights, text_preview};
use crate::search::vector::{ChunkContext, ChunkHit, EntryView, IndexSearchRequest, VectorIndex};
use crate::store::ParticipantStore;

/// Find participants similar to an existing participant or to a free-text query.
///
/// Exactly one of `participant_id` / `query` must be set. When searching by
/// participant, that participant never appears in the results.
pub async fn search_similar(
    participants: &dyn ParticipantStore,
    index: &dyn VectorIndex,
    namespace: &str,
    request: &SimilarRequest,
) -> Result<Vec<SimilarParticipant>> {
    let participant_id = request
        .participant_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let search_text = match (participant_id, query) {
        (Some(id), None) => generate_participant_text(participants, id).await?.text,
        (None, Some(q)) => q.to_string(),
        _ => {
            return Err(CoreError::InvalidArgument(
                "must provide either participantId or query".to_string(),
            ))
        }
    };
    if request.limit == 0 {
        return Err(CoreError::InvalidArgument("limit must be at least 1".to_string()));
    }

    // One extra match to make room for the likely self-match
    let response = index
        .search(IndexSearchRequest {
            namespace: namespace.to_string(),
            query: search_text,
            limit: request.limit.saturating_add(1),
            chunk_context: ChunkContext {
                before: 1,
                after: 1,
            },
        })
        .await
        .map_err(|e| CoreError::external("vector index", e))?;

    Ok(collapse_results(
        &response.results,
        &response.entries,
        participant_id,
        request.limit,
        namespace,
    ))
}

/// Access-controlled twin of [`search_similar`] exposed to the HTTP surface.
pub async fn search_similar_public(
    participants: &dyn ParticipantStore,
    index: &dyn VectorIndex,
    namespace: &str,
    request: &SimilarRequest,
) -> Result<Vec<SimilarParticipant>> {
    search_similar(participants, index, namespace, request).await
}

/// Group chunk hits per entry (max score), rank, and build result rows.
pub fn collapse_results(
    hits: &[ChunkHit],
    entries: &[EntryView],
    exclude_participant: Option<&str>,
    limit: usize,
    namespace: &str,
) -> Vec<SimilarParticipant> {
    let mut best: HashMap<&str, f32> = HashMap::new();
    for hit in hits {
        best.entry(hit.entry_id.as_str())
            .and_modify(|s| *s = s.max(hit.score))
            .or_insert(hit.score);
    }

    let mut ranked: Vec<(&str, f32)> = best.into_iter().collect();
    // Ties resolve by entry id so repeated calls return the same order
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let entries_by_id: HashMap<&str, &EntryView> =
        entries.iter().map(|e| (e.entry_id.as_str(), e)).collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();

    for (entry_id, score) in ranked {
        let Some(entry) = entries_by_id.get(entry_id) else {
            tracing::warn!(entry_id, namespace, "Search hit references an unknown entry");
            continue;
        };
        let Some(meta) = entry
            .metadata
            .participant()
            .filter(|m| !m.participant_id.is_empty())
        else {
            tracing::warn!(entry_id, namespace, "Search hit has no participantId metadata");
            continue;
        };

        let pid = meta.participant_id.as_str();
        if !seen.insert(pid) {
            continue;
        }
        if exclude_participant == Some(pid) {
            continue;
        }

        let snippets: Vec<String> = hits
            .iter()
            .filter(|h| h.entry_id == entry_id)
            .map(|h| h.content.join("\n"))
            .collect();
        let highlights = extract_highlights(snippets.iter().map(String::as_str));

        results.push(SimilarParticipant {
            participant_id: pid.to_string(),
            score,
            metadata: meta.clone(),
            text_preview: text_preview(&highlights, &entry.text),
            highlights,
        });

        if results.len() == limit {
            break;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, EntryMetadata, ParticipantMetadata};
    use crate::search::vector::{AddOutcome, IndexEntryInput, IndexSearchResponse};
    use crate::store::JsonParticipantStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records the limit it was asked for and finds nothing.
    #[derive(Default)]
    struct RecordingIndex {
        limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn add(&self, _entry: IndexEntryInput) -> anyhow::Result<AddOutcome> {
            anyhow::bail!("read-only")
        }

        async fn search(&self, request: IndexSearchRequest) -> anyhow::Result<IndexSearchResponse> {
            self.limits.lock().push(request.limit);
            Ok(IndexSearchResponse::default())
        }
    }

    struct UnreachableIndex;

    #[async_trait]
    impl VectorIndex for UnreachableIndex {
        async fn add(&self, _entry: IndexEntryInput) -> anyhow::Result<AddOutcome> {
            anyhow::bail!("connection refused")
        }

        async fn search(&self, _request: IndexSearchRequest) -> anyhow::Result<IndexSearchResponse> {
            anyhow::bail!("connection refused")
        }
    }

    fn query_request(limit: usize) -> SimilarRequest {
        SimilarRequest {
            participant_id: None,
            query: Some("gestão hospitalar".to_string()),
            limit,
        }
    }

    fn hit(entry_id: &str, score: f32, text: &str) -> ChunkHit {
        ChunkHit {
            entry_id: entry_id.to_string(),
            score,
            content: vec![text.to_string()],
        }
    }

    fn entry(entry_id: &str, participant_id: &str) -> EntryView {
        EntryView {
            entry_id: entry_id.to_string(),
            key: format!("participant-{participant_id}"),
            text: format!("[ID:{participant_id}]\nNome: {participant_id}"),
            metadata: EntryMetadata::Participant(ParticipantMetadata {
                participant_id: participant_id.to_string(),
                name: participant_id.to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_duplicate_chunks_collapse_to_max_score() {
        let hits = vec![
            hit("e1", 0.81, "Setor: Saúde"),
            hit("e1", 0.93, "Cargo: Médica"),
            hit("e1", 0.77, "Programa: Bolsas"),
        ];
        let results = collapse_results(&hits, &[entry("e1", "p1")], None, 10, "participants");
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.93).abs() < 1e-6);
        assert_eq!(results[0].highlights.len(), 3);
    }

    #[test]
    fn test_self_is_excluded() {
        let hits = vec![hit("e1", 0.99, "a"), hit("e2", 0.5, "b")];
        let entries = vec![entry("e1", "me"), entry("e2", "other")];
        let results = collapse_results(&hits, &entries, Some("me"), 10, "participants");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].participant_id, "other");
    }

    #[test]
    fn test_ties_break_by_entry_id() {
        let hits = vec![hit("e2", 0.5, "b"), hit("e1", 0.5, "a")];
        let entries = vec![entry("e2", "p2"), entry("e1", "p1")];
        let results = collapse_results(&hits, &entries, None, 10, "participants");
        let ids: Vec<&str> = results.iter().map(|r| r.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_entries_without_participant_metadata_are_skipped() {
        let hits = vec![hit("doc", 0.99, "faq"), hit("e1", 0.4, "a")];
        let entries = vec![
            EntryView {
                entry_id: "doc".to_string(),
                key: "faq".to_string(),
                text: "faq".to_string(),
                metadata: EntryMetadata::Document(DocumentMetadata {
                    title: "FAQ".to_string(),
                    source: None,
                }),
            },
            entry("e1", "p1"),
        ];
        let results = collapse_results(&hits, &entries, None, 10, "participants");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].participant_id, "p1");
    }

    #[test]
    fn test_same_participant_under_two_entries_reported_once() {
        let hits = vec![hit("e1", 0.9, "a"), hit("e2", 0.8, "b")];
        let entries = vec![entry("e1", "p1"), entry("e2", "p1")];
        let results = collapse_results(&hits, &entries, None, 10, "participants");
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_limit_is_respected() {
        let hits: Vec<ChunkHit> = (0..6)
            .map(|i| hit(&format!("e{i}"), 1.0 - i as f32 * 0.1, "x"))
            .collect();
        let entries: Vec<EntryView> = (0..6).map(|i| entry(&format!("e{i}"), &format!("p{i}"))).collect();
        for limit in 1..=6 {
            let results = collapse_results(&hits, &entries, None, limit, "participants");
            assert_eq!(results.len(), limit);
        }
    }

    #[test]
    fn test_preview_uses_first_highlight() {
        let hits = vec![hit("e1", 0.9, "[ID:p1]\nNome:  Ana")];
        let results = collapse_results(&hits, &[entry("e1", "p1")], None, 10, "participants");
        assert_eq!(results[0].text_preview, "Nome: Ana");
    }

    #[tokio::test]
    async fn test_huge_limit_does_not_overflow() {
        let participants = JsonParticipantStore::from_records(Vec::new(), Vec::new());
        let index = RecordingIndex::default();

        let results = search_similar(&participants, &index, "participants", &query_request(usize::MAX))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(*index.limits.lock(), vec![usize::MAX]);
    }

    #[tokio::test]
    async fn test_asks_index_for_one_extra_match() {
        let participants = JsonParticipantStore::from_records(Vec::new(), Vec::new());
        let index = RecordingIndex::default();

        search_similar(&participants, &index, "participants", &query_request(5))
            .await
            .unwrap();
        assert_eq!(*index.limits.lock(), vec![6]);
    }

    #[tokio::test]
    async fn test_index_failure_is_an_external_service_error() {
        let participants = JsonParticipantStore::from_records(Vec::new(), Vec::new());

        let err = search_similar(&participants, &UnreachableIndex, "participants", &query_request(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExternalService {
                service: "vector index",
                ..
            }
        ));
        assert!(err.to_string().contains("connection refused"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant record as owned by the admin system.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub seniority: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<u32>,
    #[serde(default)]
    pub career_area: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age_range: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub cohort: Option<String>,
    #[serde(default)]
    pub is_council_member: bool,
    #[serde(default)]
    pub is_mentor: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub created_at: i64,
}

/// Free-text narrative fields collected for a participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub participant_id: String,
    #[serde(default)]
    pub achievements: Option<String>,
    #[serde(default)]
    pub future_vision: Option<String>,
    #[serde(default)]
    pub challenges_overcome: Option<String>,
    #[serde(default)]
    pub current_challenges: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Denormalized participant fields carried by index entries, cache rows and
/// cluster points so that consumers never join back to the participant table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMetadata {
    pub participant_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub updated_at: i64,
}

impl ParticipantMetadata {
    pub fn from_participant(participant: &Participant, updated_at: i64) -> Self {
        Self {
            participant_id: participant.id.clone(),
            name: participant.name.clone(),
            role: participant.role.clone(),
            company: participant.company.clone(),
            sector: participant.sector.clone(),
            program: participant.program.clone(),
            updated_at,
        }
    }
}

/// Known shapes of metadata attached to an index entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryMetadata {
    Participant(ParticipantMetadata),
    Document(DocumentMetadata),
}

impl EntryMetadata {
    pub fn participant(&self) -> Option<&ParticipantMetadata> {
        match self {
            EntryMetadata::Participant(meta) => Some(meta),
            EntryMetadata::Document(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// A participant surfaced by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimilarParticipant {
    pub participant_id: String,
    pub score: f32,
    pub metadata: ParticipantMetadata,
    pub text_preview: String,
    pub highlights: Vec<String>,
}

/// One row of the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedEmbeddingRecord {
    pub participant_id: String,
    pub embedding: Vec<f32>,
    pub x: f32,
    pub y: f32,
    /// 50D projection used as the clustering substrate
    #[serde(default)]
    pub clustering_embedding: Option<Vec<f32>>,
    pub metadata: ParticipantMetadata,
    pub version: String,
}

/// Persisted lifecycle of the embedding cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    #[default]
    Empty,
    Clearing {
        version: String,
    },
    Populating {
        version: String,
        written: usize,
    },
    Ready {
        version: String,
        count: usize,
    },
}

impl CacheStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheStatus::Ready { .. })
    }
}

/// Outcome of a cache build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub cached: usize,
    pub skipped: usize,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusResponse {
    pub status: CacheStatus,
    pub count: usize,
}

/// A 2D point of the cached projection, for visualization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedPoint {
    pub participant_id: String,
    pub x: f32,
    pub y: f32,
    pub metadata: ParticipantMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPoint {
    pub participant_id: String,
    pub x: f32,
    pub y: f32,
    /// -1 marks noise
    pub cluster_id: i32,
    pub metadata: ParticipantMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStat {
    pub cluster_id: i32,
    pub count: usize,
    pub label: String,
}

/// Which projection the clusterer ran on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringSubstrate {
    FiftyD,
    TwoD,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringParameters {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub substrate: ClusteringSubstrate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringResult {
    pub points: Vec<ClusterPoint>,
    pub cluster_stats: Vec<ClusterStat>,
    pub total_participants: usize,
    pub parameters: ClusteringParameters,
}

/// The single most recent clustering run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    pub points: Vec<ClusterPoint>,
    pub cluster_stats: Vec<ClusterStat>,
    pub parameters: ClusteringParameters,
    pub cache_version: Option<String>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInsight {
    pub cluster_id: i32,
    pub name: String,
    pub description: String,
    pub commonalities: Vec<String>,
    pub count: usize,
}

/// Cache build request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRequest {
    pub limit: Option<usize>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Clustering request; unset fields fall back to the configured defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteringRequest {
    pub min_cluster_size: Option<usize>,
    pub min_samples: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRequest {
    pub cluster_points: Vec<ClusterPoint>,
}

/// Similarity search request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarRequest {
    pub participant_id: Option<String>,
    pub query: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_metadata_is_tagged_by_kind() {
        let meta = EntryMetadata::Participant(ParticipantMetadata {
            participant_id: "p1".to_string(),
            name: "Ana".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "participant");
        assert_eq!(json["participantId"], "p1");
    }

    #[test]
    fn test_document_metadata_has_no_participant() {
        let meta = EntryMetadata::Document(DocumentMetadata {
            title: "FAQ".to_string(),
            source: None,
        });
        assert!(meta.participant().is_none());
    }

    #[test]
    fn test_cache_status_serializes_with_state_tag() {
        let status = CacheStatus::Ready {
            version: "v1".to_string(),
            count: 3,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_similar_request_defaults_limit() {
        let req: SimilarRequest = serde_json::from_str(r#"{"query": "fintech"}"#).unwrap();
        assert_eq!(req.limit, 10);
        assert!(req.participant_id.is_none());
    }

    #[test]
    fn test_participant_deserializes_sparse_record() {
        let p: Participant = serde_json::from_str(r#"{"id": "p9"}"#).unwrap();
        assert_eq!(p.id, "p9");
        assert!(p.name.is_empty());
        assert!(!p.is_council_member);
        assert!(p.tags.is_empty());
    }
}

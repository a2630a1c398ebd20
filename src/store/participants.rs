use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::models::{Participant, Profile};

/// Read-only access to participant and profile records.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn participant(&self, id: &str) -> Result<Option<Participant>>;

    async fn profile(&self, participant_id: &str) -> Result<Option<Profile>>;

    /// Participant ids, newest first, optionally capped at `limit`.
    async fn list_participant_ids(&self, limit: Option<usize>) -> Result<Vec<String>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ParticipantFile {
    #[serde(default)]
    participants: Vec<Participant>,
    #[serde(default)]
    profiles: Vec<Profile>,
}

/// Participant source backed by a JSON export of the admin tables.
pub struct JsonParticipantStore {
    participants: RwLock<HashMap<String, Participant>>,
    profiles: RwLock<HashMap<String, Profile>>,
}

impl JsonParticipantStore {
    /// Load `participants.json`; a missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<ParticipantFile>(&data)?
        } else {
            tracing::warn!("No participant export at {}, starting empty", path.display());
            ParticipantFile::default()
        };
        Ok(Self::from_records(file.participants, file.profiles))
    }

    pub fn from_records(participants: Vec<Participant>, profiles: Vec<Profile>) -> Self {
        Self {
            participants: RwLock::new(
                participants.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ),
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|p| (p.participant_id.clone(), p))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.participants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.read().is_empty()
    }
}

#[async_trait]
impl ParticipantStore for JsonParticipantStore {
    async fn participant(&self, id: &str) -> Result<Option<Participant>> {
        Ok(self.participants.read().get(id).cloned())
    }

    async fn profile(&self, participant_id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(participant_id).cloned())
    }

    async fn list_participant_ids(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let participants = self.participants.read();
        let mut ordered: Vec<&Participant> = participants.values().collect();
        // Newest first; id keeps equal timestamps in a stable order
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let take = limit.unwrap_or(ordered.len());
        Ok(ordered.into_iter().take(take).map(|p| p.id.clone()).collect())
    }
}

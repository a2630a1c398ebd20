use std::sync::Arc;

use crate::config::Config;
use crate::llm::{HttpEmbeddingProvider, HttpTextGenerator, RawEmbeddingProvider, TextGenerator};
use crate::search::{LocalVectorIndex, VectorIndex};
use crate::store::{CacheStore, JsonDocumentStore, JsonParticipantStore, ParticipantStore};

/// Shared application state.
///
/// Every collaborator sits behind a trait object so tests and embedders of
/// the library can swap in their own implementations.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub participants: Arc<dyn ParticipantStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn RawEmbeddingProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    /// Wire the local file-backed stores and HTTP model clients from `config`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let embedder: Arc<dyn RawEmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
            http_client.clone(),
            config.llm.clone(),
        ));
        let generator: Arc<dyn TextGenerator> =
            Arc::new(HttpTextGenerator::new(http_client, config.llm.clone()));

        let participants = JsonParticipantStore::open(&config.participants_path())?;
        tracing::info!(participants = participants.len(), "Loaded participant store");

        let index = LocalVectorIndex::open_or_create(
            &config.index_path(),
            embedder.clone(),
            config.index.chunk_chars,
        )?;
        tracing::info!(entries = index.entry_count(), namespace = %config.index.namespace, "Loaded RAG index");

        let cache = JsonDocumentStore::open(&config.cache_path())?;

        Ok(Self::with_collaborators(
            config,
            Arc::new(participants),
            Arc::new(index),
            embedder,
            generator,
            Arc::new(cache),
        ))
    }

    pub fn with_collaborators(
        config: Config,
        participants: Arc<dyn ParticipantStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn RawEmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            config,
            participants,
            index,
            embedder,
            generator,
            cache,
        }
    }
}

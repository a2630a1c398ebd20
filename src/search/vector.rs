use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::llm::embeddings::RawEmbeddingProvider;
use crate::models::EntryMetadata;
use crate::search::chunking::chunk_text;

/// An entry to upsert into the index, identified by `(namespace, key)`.
#[derive(Debug, Clone)]
pub struct IndexEntryInput {
    pub namespace: String,
    pub key: String,
    pub text: String,
    pub metadata: EntryMetadata,
}

/// How many neighbouring chunks to return around each matching chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkContext {
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone)]
pub struct IndexSearchRequest {
    pub namespace: String,
    pub query: String,
    pub limit: usize,
    pub chunk_context: ChunkContext,
}

/// A chunk-level match. `content` is the matching chunk with its context
/// chunks, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub entry_id: String,
    pub score: f32,
    pub content: Vec<String>,
}

/// Entry-level view of every entry referenced by a search's chunk hits.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView {
    pub entry_id: String,
    pub key: String,
    pub text: String,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct IndexSearchResponse {
    pub results: Vec<ChunkHit>,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    pub entry_id: String,
    /// False when an identical entry was already stored under the key
    pub changed: bool,
}

/// RAG vector index: upsert-by-key writes and chunk-level nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, entry: IndexEntryInput) -> Result<AddOutcome>;

    async fn search(&self, request: IndexSearchRequest) -> Result<IndexSearchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    text: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    entry_id: String,
    namespace: String,
    key: String,
    text: String,
    metadata: EntryMetadata,
    chunks: Vec<StoredChunk>,
}

/// In-process vector index with disk persistence and cosine similarity search.
pub struct LocalVectorIndex {
    entries: RwLock<Vec<StoredEntry>>,
    embedder: Arc<dyn RawEmbeddingProvider>,
    persist_path: Option<PathBuf>,
    chunk_chars: usize,
}

impl LocalVectorIndex {
    pub fn open_or_create(
        path: &Path,
        embedder: Arc<dyn RawEmbeddingProvider>,
        chunk_chars: usize,
    ) -> Result<Self> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(path).context("Failed to read vector index")?;
            serde_json::from_str(&data).context("Failed to parse vector index")?
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            embedder,
            persist_path: Some(path.to_path_buf()),
            chunk_chars,
        })
    }

    pub fn in_memory(embedder: Arc<dyn RawEmbeddingProvider>, chunk_chars: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            embedder,
            persist_path: None,
            chunk_chars,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(&*self.entries.read())?;
        crate::store::write_atomic(path, &data).context("Failed to write vector index")?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn add(&self, entry: IndexEntryInput) -> Result<AddOutcome> {
        anyhow::ensure!(!entry.text.trim().is_empty(), "Refusing to index empty text");

        let existing_id = {
            let entries = self.entries.read();
            let existing = entries
                .iter()
                .find(|e| e.namespace == entry.namespace && e.key == entry.key);
            match existing {
                Some(e) if e.text == entry.text && e.metadata == entry.metadata => {
                    return Ok(AddOutcome {
                        entry_id: e.entry_id.clone(),
                        changed: false,
                    });
                }
                Some(e) => Some(e.entry_id.clone()),
                None => None,
            }
        };

        let pieces = chunk_text(&entry.text, self.chunk_chars);
        let embeddings = try_join_all(pieces.iter().map(|p| self.embedder.embed(p)))
            .await
            .with_context(|| format!("Failed to embed chunks for {}", entry.key))?;

        let chunks: Vec<StoredChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| StoredChunk { text, embedding })
            .collect();

        let entry_id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let stored = StoredEntry {
            entry_id: entry_id.clone(),
            namespace: entry.namespace,
            key: entry.key,
            text: entry.text,
            metadata: entry.metadata,
            chunks,
        };

        {
            let mut entries = self.entries.write();
            // Re-check under the write lock: another add for the key may have landed
            entries.retain(|e| !(e.namespace == stored.namespace && e.key == stored.key));
            entries.push(stored);
        }
        self.persist()?;

        Ok(AddOutcome {
            entry_id,
            changed: true,
        })
    }

    async fn search(&self, request: IndexSearchRequest) -> Result<IndexSearchResponse> {
        if request.limit == 0 || request.query.trim().is_empty() {
            return Ok(IndexSearchResponse::default());
        }

        let query_embedding = self
            .embedder
            .embed(&request.query)
            .await
            .context("Failed to embed search query")?;

        let entries = self.entries.read();

        // (score, entry index, chunk index)
        let mut scored: Vec<(f32, usize, usize)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.namespace == request.namespace)
            .flat_map(|(ei, e)| {
                e.chunks
                    .iter()
                    .enumerate()
                    .map(move |(ci, c)| (ei, ci, &c.embedding))
            })
            .map(|(ei, ci, emb)| (cosine_similarity(&query_embedding, emb), ei, ci))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| entries[a.1].entry_id.cmp(&entries[b.1].entry_id))
                .then(a.2.cmp(&b.2))
        });
        scored.truncate(request.limit);

        let mut response = IndexSearchResponse::default();
        let mut referenced: Vec<usize> = Vec::new();

        for (score, ei, ci) in scored {
            let entry = &entries[ei];
            let first = ci.saturating_sub(request.chunk_context.before);
            let last = (ci + request.chunk_context.after).min(entry.chunks.len() - 1);

            response.results.push(ChunkHit {
                entry_id: entry.entry_id.clone(),
                score,
                content: entry.chunks[first..=last]
                    .iter()
                    .map(|c| c.text.clone())
                    .collect(),
            });
            if !referenced.contains(&ei) {
                referenced.push(ei);
            }
        }

        response.entries = referenced
            .into_iter()
            .map(|ei| {
                let e = &entries[ei];
                EntryView {
                    entry_id: e.entry_id.clone(),
                    key: e.key.clone(),
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                }
            })
            .collect();

        Ok(response)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

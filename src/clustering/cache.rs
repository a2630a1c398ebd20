//! Embedding cache: build once, cluster many times.
//!
//! A build embeds every participant's consolidated text, projects the batch
//! to 2D and 50D, and replaces the stored cache under a fresh version tag.
//! Progress is mirrored into the persisted [`CacheStatus`] so a build that
//! dies halfway is detected (status not `Ready`) and rebuilt on the next call.

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;

use crate::clustering::reducer::{reduce, DualProjection};
use crate::config::ClusteringConfig;
use crate::consolidate::{generate_participant_text, has_indexable_content};
use crate::error::{CoreError, Result};
use crate::llm::RawEmbeddingProvider;
use crate::models::{CacheReport, CacheRequest, CacheStatus, CachedEmbeddingRecord, ParticipantMetadata};
use crate::store::{CacheStore, ParticipantStore};

/// Page size used when reading the whole cache back.
pub const READ_PAGE_SIZE: usize = 500;

struct EmbeddedParticipant {
    participant_id: String,
    embedding: Vec<f32>,
    metadata: ParticipantMetadata,
}

/// Build (or reuse) the embedding cache.
///
/// Without `force_refresh`, a populated cache whose last build completed is
/// left alone and reported as `{cached: 0, skipped: <rows>}`. Fewer than `config.min_participants` usable embeddings is
/// not an error: nothing is written and every participant counts as skipped.
pub async fn generate_umap_cache(
    participants: &dyn ParticipantStore,
    embedder: Arc<dyn RawEmbeddingProvider>,
    store: &dyn CacheStore,
    config: &ClusteringConfig,
    request: &CacheRequest,
) -> Result<CacheReport> {
    if !request.force_refresh {
        let existing = store.embedding_count().await?;
        let status = store.cache_status().await?;
        if existing > 0 && status.is_ready() {
            let version = store.current_version().await?;
            tracing::info!(cached = existing, ?version, "Embedding cache already populated");
            return Ok(CacheReport {
                cached: 0,
                skipped: existing,
                version,
            });
        }
        if existing > 0 {
            tracing::warn!(rows = existing, ?status, "Previous cache build did not finish, rebuilding");
        }
    }

    let ids = participants.list_participant_ids(request.limit).await?;
    let total = ids.len();
    tracing::info!(participants = total, "Building embedding cache");

    let mut embedded = Vec::with_capacity(total);
    for (batch_no, batch) in ids.chunks(config.embed_batch_size.max(1)).enumerate() {
        let results = join_all(
            batch
                .iter()
                .map(|id| embed_participant(participants, embedder.as_ref(), id)),
        )
        .await;
        embedded.extend(results.into_iter().flatten());
        tracing::debug!(batch = batch_no + 1, embedded = embedded.len(), "Embedded batch");
    }

    let embedded = drop_mismatched_dimensions(embedded);

    if embedded.len() < config.min_participants {
        tracing::warn!(
            embedded = embedded.len(),
            required = config.min_participants,
            "Not enough participants to build a projection"
        );
        return Ok(CacheReport {
            cached: 0,
            skipped: total,
            version: None,
        });
    }

    let vectors: Vec<Vec<f32>> = embedded.iter().map(|e| e.embedding.clone()).collect();
    let seed = config.seed;
    let projection = tokio::task::spawn_blocking(move || reduce(&vectors, seed))
        .await
        .map_err(|e| CoreError::Clustering(format!("projection task failed: {e}")))??;

    let version = new_version();
    let records = build_records(embedded, projection, &version);
    let cached = records.len();

    persist_records(store, records, &version, config.persist_chunk_size, true).await?;

    tracing::info!(cached, skipped = total - cached, %version, "Embedding cache ready");
    Ok(CacheReport {
        cached,
        skipped: total - cached,
        version: Some(version),
    })
}

/// Embed one participant; failures are logged and the participant dropped.
async fn embed_participant(
    participants: &dyn ParticipantStore,
    embedder: &dyn RawEmbeddingProvider,
    participant_id: &str,
) -> Option<EmbeddedParticipant> {
    let consolidated = match generate_participant_text(participants, participant_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(participant_id, error = %e, "Skipping participant: text unavailable");
            return None;
        }
    };
    if !has_indexable_content(&consolidated.text) {
        tracing::debug!(participant_id, "Skipping participant with no data");
        return None;
    }

    match embedder.embed(&consolidated.text).await {
        Ok(embedding) if !embedding.is_empty() => Some(EmbeddedParticipant {
            participant_id: participant_id.to_string(),
            embedding,
            metadata: ParticipantMetadata::from_participant(
                &consolidated.participant,
                consolidated.last_updated,
            ),
        }),
        Ok(_) => {
            tracing::warn!(participant_id, "Skipping participant: empty embedding");
            None
        }
        Err(e) => {
            tracing::warn!(participant_id, error = %e, "Skipping participant: embedding failed");
            None
        }
    }
}

/// Keep only embeddings whose dimension matches the first one.
fn drop_mismatched_dimensions(embedded: Vec<EmbeddedParticipant>) -> Vec<EmbeddedParticipant> {
    let Some(dim) = embedded.first().map(|e| e.embedding.len()) else {
        return embedded;
    };
    embedded
        .into_iter()
        .filter(|e| {
            let ok = e.embedding.len() == dim;
            if !ok {
                tracing::warn!(
                    participant_id = %e.participant_id,
                    got = e.embedding.len(),
                    expected = dim,
                    "Skipping participant: embedding dimension mismatch"
                );
            }
            ok
        })
        .collect()
}

fn new_version() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("v{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

fn build_records(
    embedded: Vec<EmbeddedParticipant>,
    projection: DualProjection,
    version: &str,
) -> Vec<CachedEmbeddingRecord> {
    embedded
        .into_iter()
        .zip(projection.visual)
        .zip(projection.clustering)
        .map(|((e, (x, y)), clustering)| CachedEmbeddingRecord {
            participant_id: e.participant_id,
            embedding: e.embedding,
            x,
            y,
            clustering_embedding: Some(clustering),
            metadata: e.metadata,
            version: version.to_string(),
        })
        .collect()
}

/// Write `records` in chunks of `chunk_size`, capped at the store's
/// per-call insert limit.
///
/// With `clear_old`, existing rows are deleted before the first chunk only;
/// later chunks append. The cache status tracks progress and ends `Ready`.
pub async fn persist_records(
    store: &dyn CacheStore,
    records: Vec<CachedEmbeddingRecord>,
    version: &str,
    chunk_size: usize,
    clear_old: bool,
) -> Result<usize> {
    let ceiling = store.max_insert().max(1);
    if chunk_size > ceiling {
        tracing::warn!(chunk_size, ceiling, "Persist chunk size exceeds the store insert limit, capping");
    }
    let chunk_size = chunk_size.clamp(1, ceiling);
    let total = records.len();

    if records.is_empty() && clear_old {
        persist_chunk(store, Vec::new(), version, true).await?;
    }

    let mut written = 0;
    for (i, chunk) in records.chunks(chunk_size).enumerate() {
        written += persist_chunk(store, chunk.to_vec(), version, clear_old && i == 0).await?;
        store
            .set_cache_status(CacheStatus::Populating {
                version: version.to_string(),
                written,
            })
            .await?;
        tracing::debug!(written, total, "Persisted cache chunk");
    }

    store
        .set_cache_status(CacheStatus::Ready {
            version: version.to_string(),
            count: written,
        })
        .await?;
    Ok(written)
}

/// Optionally clear the cache, then insert one chunk.
pub async fn persist_chunk(
    store: &dyn CacheStore,
    chunk: Vec<CachedEmbeddingRecord>,
    version: &str,
    clear_old: bool,
) -> Result<usize> {
    if clear_old {
        store
            .set_cache_status(CacheStatus::Clearing {
                version: version.to_string(),
            })
            .await?;
        let removed = store.clear_embeddings().await?;
        tracing::info!(removed, "Cleared previous embedding cache");
    }

    let count = chunk.len();
    if count > 0 {
        store.insert_embeddings(chunk).await?;
    }
    Ok(count)
}

/// Read every cached row, page by page.
pub async fn collect_embeddings(store: &dyn CacheStore) -> Result<Vec<CachedEmbeddingRecord>> {
    let mut records = Vec::new();
    let mut cursor = 0;
    loop {
        let page = store.embeddings_page(cursor, READ_PAGE_SIZE).await?;
        records.extend(page.records);
        match page.next_cursor {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(records)
}

//! Participant clustering over the embedding cache.
//!
//! ```text
//! participants → consolidate → embed → UMAP (2D + 50D) → cache
//!                                                          ↓
//!                      snapshot ← stats ← HDBSCAN (on 50D) ←
//! ```
//!
//! The cache build is expensive and runs on demand; clustering reads the
//! cache and can be re-run cheaply with different density parameters.

pub mod cache;
pub mod density;
pub mod reducer;
pub mod umap;

pub use cache::{collect_embeddings, generate_umap_cache, persist_chunk, persist_records};

use chrono::Utc;

use crate::config::ClusteringConfig;
use crate::error::{CoreError, Result};
use crate::llm::insights::NOISE_NAME;
use crate::models::{
    CacheStatusResponse, CachedEmbeddingRecord, CachedPoint, ClusterPoint, ClusterSnapshot,
    ClusterStat, ClusteringParameters, ClusteringRequest, ClusteringResult, ClusteringSubstrate,
};
use crate::store::CacheStore;

/// Cluster the cached projection and store the result as the latest snapshot.
///
/// Runs on the 50D projection. If any cached row lacks it, the whole run
/// falls back to the 2D coordinates so every point is clustered in the same
/// space. Fewer cached rows than `config.min_participants` yields an empty
/// result and leaves the stored snapshot untouched.
pub async fn run_clustering_on_cache(
    store: &dyn CacheStore,
    config: &ClusteringConfig,
    request: &ClusteringRequest,
) -> Result<ClusteringResult> {
    let min_cluster_size = request.min_cluster_size.unwrap_or(config.min_cluster_size);
    let min_samples = request.min_samples.unwrap_or(config.min_samples);
    if min_cluster_size == 0 || min_samples == 0 {
        return Err(CoreError::InvalidArgument(
            "minClusterSize and minSamples must be positive".to_string(),
        ));
    }

    let records = collect_embeddings(store).await?;
    let (substrate, data) = clustering_input(&records);
    let parameters = ClusteringParameters {
        min_cluster_size,
        min_samples,
        substrate,
    };

    if records.len() < config.min_participants {
        tracing::warn!(
            cached = records.len(),
            required = config.min_participants,
            "Not enough cached participants to cluster"
        );
        return Ok(ClusteringResult {
            points: Vec::new(),
            cluster_stats: Vec::new(),
            total_participants: records.len(),
            parameters,
        });
    }

    let labels = tokio::task::spawn_blocking(move || {
        density::cluster_points(&data, min_cluster_size, min_samples)
    })
    .await
    .map_err(|e| CoreError::Clustering(format!("clustering task failed: {e}")))??;

    let cluster_stats = cluster_stats(&labels);
    let cache_version = records.first().map(|r| r.version.clone());
    let points: Vec<ClusterPoint> = records
        .into_iter()
        .zip(labels)
        .map(|(r, cluster_id)| ClusterPoint {
            participant_id: r.participant_id,
            x: r.x,
            y: r.y,
            cluster_id,
            metadata: r.metadata,
        })
        .collect();

    let clusters = cluster_stats.iter().filter(|s| s.cluster_id >= 0).count();
    tracing::info!(
        points = points.len(),
        clusters,
        ?substrate,
        min_cluster_size,
        min_samples,
        "Clustering complete"
    );

    let result = ClusteringResult {
        total_participants: points.len(),
        points,
        cluster_stats,
        parameters,
    };

    store
        .replace_cluster_snapshot(ClusterSnapshot {
            points: result.points.clone(),
            cluster_stats: result.cluster_stats.clone(),
            parameters: result.parameters.clone(),
            cache_version,
            computed_at: Utc::now(),
        })
        .await?;

    Ok(result)
}

/// The latest snapshot, if one exists and matches every parameter the
/// caller specified.
pub async fn get_cached_cluster_results(
    store: &dyn CacheStore,
    request: &ClusteringRequest,
) -> Result<Option<ClusterSnapshot>> {
    let Some(snapshot) = store.cluster_snapshot().await? else {
        return Ok(None);
    };

    let mismatch = request
        .min_cluster_size
        .is_some_and(|m| m != snapshot.parameters.min_cluster_size)
        || request
            .min_samples
            .is_some_and(|m| m != snapshot.parameters.min_samples);
    if mismatch {
        tracing::debug!(?request, stored = ?snapshot.parameters, "Cached clusters use other parameters");
        return Ok(None);
    }

    Ok(Some(snapshot))
}

pub async fn cache_status(store: &dyn CacheStore) -> Result<CacheStatusResponse> {
    Ok(CacheStatusResponse {
        status: store.cache_status().await?,
        count: store.embedding_count().await?,
    })
}

/// 2D coordinates of every cached participant.
pub async fn cached_points(store: &dyn CacheStore) -> Result<Vec<CachedPoint>> {
    Ok(collect_embeddings(store)
        .await?
        .into_iter()
        .map(|r| CachedPoint {
            participant_id: r.participant_id,
            x: r.x,
            y: r.y,
            metadata: r.metadata,
        })
        .collect())
}

fn clustering_input(records: &[CachedEmbeddingRecord]) -> (ClusteringSubstrate, Vec<Vec<f32>>) {
    let missing = records
        .iter()
        .filter(|r| r.clustering_embedding.as_ref().map_or(true, Vec::is_empty))
        .count();

    if missing == 0 {
        let data = records
            .iter()
            .filter_map(|r| r.clustering_embedding.clone())
            .collect();
        return (ClusteringSubstrate::FiftyD, data);
    }

    tracing::warn!(
        missing,
        total = records.len(),
        "Cached rows lack the clustering projection, clustering on 2D coordinates"
    );
    let data = records.iter().map(|r| vec![r.x, r.y]).collect();
    (ClusteringSubstrate::TwoD, data)
}

fn cluster_stats(labels: &[i32]) -> Vec<ClusterStat> {
    density::label_counts(labels)
        .into_iter()
        .map(|(cluster_id, count)| ClusterStat {
            cluster_id,
            count,
            label: if cluster_id < 0 {
                NOISE_NAME.to_string()
            } else {
                format!("Cluster {}", cluster_id + 1)
            },
        })
        .collect()
}

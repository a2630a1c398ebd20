use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::models::{CacheStatus, CachedEmbeddingRecord, ClusterSnapshot};

/// Largest number of rows a single insert call may carry.
pub const MAX_INSERT_RECORDS: usize = 100;

/// One page of cached embedding rows.
#[derive(Debug, Clone)]
pub struct EmbeddingPage {
    pub records: Vec<CachedEmbeddingRecord>,
    /// Cursor for the next page, `None` once exhausted
    pub next_cursor: Option<usize>,
}

/// Document-store mutations used by the cache and cluster pipelines.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn embedding_count(&self) -> Result<usize>;

    /// Version tag of the cached rows, if any exist.
    async fn current_version(&self) -> Result<Option<String>>;

    /// Delete every cached row, returning how many were removed.
    async fn clear_embeddings(&self) -> Result<usize>;

    async fn insert_embeddings(&self, records: Vec<CachedEmbeddingRecord>) -> Result<()>;

    /// Most rows [`CacheStore::insert_embeddings`] accepts in one call.
    fn max_insert(&self) -> usize {
        MAX_INSERT_RECORDS
    }

    async fn embeddings_page(&self, cursor: usize, page_size: usize) -> Result<EmbeddingPage>;

    async fn cache_status(&self) -> Result<CacheStatus>;

    async fn set_cache_status(&self, status: CacheStatus) -> Result<()>;

    async fn cluster_snapshot(&self) -> Result<Option<ClusterSnapshot>>;

    /// Delete the existing snapshot (if any) and store `snapshot` in its place.
    async fn replace_cluster_snapshot(&self, snapshot: ClusterSnapshot) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Documents {
    #[serde(default)]
    embeddings: Vec<CachedEmbeddingRecord>,
    #[serde(default)]
    status: CacheStatus,
    #[serde(default)]
    snapshot: Option<ClusterSnapshot>,
}

/// Document store kept in memory and mirrored to a JSON file.
pub struct JsonDocumentStore {
    docs: RwLock<Documents>,
    persist_path: Option<PathBuf>,
    max_insert: usize,
}

impl JsonDocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let docs = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            Documents::default()
        };

        Ok(Self {
            docs: RwLock::new(docs),
            persist_path: Some(path.to_path_buf()),
            max_insert: MAX_INSERT_RECORDS,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            docs: RwLock::new(Documents::default()),
            persist_path: None,
            max_insert: MAX_INSERT_RECORDS,
        }
    }

    pub fn with_max_insert(mut self, max_insert: usize) -> Self {
        self.max_insert = max_insert.max(1);
        self
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(&*self.docs.read())?;
        super::write_atomic(path, &data)?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for JsonDocumentStore {
    async fn embedding_count(&self) -> Result<usize> {
        Ok(self.docs.read().embeddings.len())
    }

    async fn current_version(&self) -> Result<Option<String>> {
        Ok(self.docs.read().embeddings.first().map(|r| r.version.clone()))
    }

    async fn clear_embeddings(&self) -> Result<usize> {
        let removed = {
            let mut docs = self.docs.write();
            let removed = docs.embeddings.len();
            docs.embeddings.clear();
            removed
        };
        self.persist()?;
        Ok(removed)
    }

    async fn insert_embeddings(&self, records: Vec<CachedEmbeddingRecord>) -> Result<()> {
        if records.len() > self.max_insert {
            return Err(CoreError::Store(format!(
                "insert of {} rows exceeds the per-call limit of {}",
                records.len(),
                self.max_insert
            )));
        }
        self.docs.write().embeddings.extend(records);
        self.persist()
    }

    fn max_insert(&self) -> usize {
        self.max_insert
    }

    async fn embeddings_page(&self, cursor: usize, page_size: usize) -> Result<EmbeddingPage> {
        let docs = self.docs.read();
        let page_size = page_size.max(1);
        let end = (cursor + page_size).min(docs.embeddings.len());
        let records = docs
            .embeddings
            .get(cursor..end)
            .map(|slice| slice.to_vec())
            .unwrap_or_default();
        let next_cursor = (end < docs.embeddings.len()).then_some(end);
        Ok(EmbeddingPage {
            records,
            next_cursor,
        })
    }

    async fn cache_status(&self) -> Result<CacheStatus> {
        Ok(self.docs.read().status.clone())
    }

    async fn set_cache_status(&self, status: CacheStatus) -> Result<()> {
        self.docs.write().status = status;
        self.persist()
    }

    async fn cluster_snapshot(&self) -> Result<Option<ClusterSnapshot>> {
        Ok(self.docs.read().snapshot.clone())
    }

    async fn replace_cluster_snapshot(&self, snapshot: ClusterSnapshot) -> Result<()> {
        self.docs.write().snapshot = Some(snapshot);
        self.persist()
    }
}

//! Storage collaborators: the read-only participant source and the document
//! store that holds the embedding cache and cluster snapshot.

pub mod documents;
pub mod participants;

pub use documents::{CacheStore, EmbeddingPage, JsonDocumentStore};
pub use participants::{JsonParticipantStore, ParticipantStore};

/// Write `data` to `path` atomically via a temp file + rename.
pub(crate) fn write_atomic(path: &std::path::Path, data: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)
}

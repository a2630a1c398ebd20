//! LLM-backed collaborators: raw embeddings, text generation, and the
//! cluster insight generator built on top of them.

pub mod embeddings;
pub mod generate;
pub mod insights;

pub use embeddings::{HttpEmbeddingProvider, RawEmbeddingProvider};
pub use generate::{HttpTextGenerator, TextGenerator};

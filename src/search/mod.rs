//! The similarity-search read path: the RAG index collaborator, the chunker
//! it uses, and per-participant result collapsing.

pub mod chunking;
pub mod similar;
pub mod snippet;
pub mod vector;

pub use similar::{search_similar, search_similar_public};
pub use vector::{LocalVectorIndex, VectorIndex};

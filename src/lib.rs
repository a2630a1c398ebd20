//! # participant-rag
//!
//! Participant similarity search and clustering for a mentoring-program
//! admin service.
//!
//! ## Architecture
//!
//! Two read paths share one text representation of a participant:
//!
//! ```text
//!                     ┌──────────────────────┐
//!                     │ Participant + Profile │
//!                     └──────────┬───────────┘
//!                                │ consolidate
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  Consolidated text    │
//!                     │  [ID:..] + fields     │
//!                     └─────┬──────────┬─────┘
//!                           │          │
//!            index (chunks) │          │ embed (whole text)
//!                           ▼          ▼
//!              ┌──────────────┐   ┌──────────────────┐
//!              │  RAG index   │   │ UMAP 2D + 50D     │
//!              └──────┬───────┘   └────────┬─────────┘
//!                     │                    │ chunked persist
//!                     ▼                    ▼
//!              ┌──────────────┐   ┌──────────────────┐
//!              │ Similar      │   │ Embedding cache   │
//!              │ participants │   └────────┬─────────┘
//!              └──────────────┘            │ HDBSCAN (50D)
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │ Cluster snapshot  │──► LLM insights
//!                                 └──────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dir, LLM, index and clustering
//! - [`models`] - Participant records, cache rows, cluster results, request/response types
//! - [`consolidate`] - Deterministic participant text with the hidden id token
//! - [`store`] - Participant source and document store (cache rows, status, snapshot)
//! - [`search`] - RAG vector index, chunking, snippets and similar-participant search
//! - [`indexing`] - Upserting participants into the RAG index
//! - [`clustering`] - Embedding cache build, UMAP, HDBSCAN and cluster snapshots
//! - [`llm`] - Embedding and text-generation clients, cluster insights
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state holding the collaborators

pub mod api;
pub mod clustering;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod indexing;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;

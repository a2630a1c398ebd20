use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where participant data, the vector index and the cache are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// RAG index configuration
    pub index: IndexConfig,
    /// Cache build and clustering defaults
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for cluster insights
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Sampling temperature for insight generation
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Namespace participant entries are written to
    pub namespace: String,
    /// Character budget per indexed chunk
    pub chunk_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    /// Concurrent embedding requests per batch
    pub embed_batch_size: usize,
    /// Minimum embedded participants before reduction runs
    pub min_participants: usize,
    /// Cache rows written per store call
    pub persist_chunk_size: usize,
    /// Seed for the projection optimizer
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            llm: LlmConfig::default(),
            index: IndexConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            temperature: 0.7,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            namespace: "participants".to_string(),
            chunk_chars: 600,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 3,
            embed_batch_size: 50,
            min_participants: 5,
            persist_chunk_size: 100,
            seed: 42,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("PARTICIPANT_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("PARTICIPANT_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.temperature = v;
            }
        }

        if let Ok(ns) = std::env::var("PARTICIPANT_RAG_NAMESPACE") {
            config.index.namespace = ns;
        }
        if let Ok(val) = std::env::var("PARTICIPANT_RAG_CHUNK_CHARS") {
            if let Ok(v) = val.parse() {
                config.index.chunk_chars = v;
            }
        }

        if let Ok(val) = std::env::var("PARTICIPANT_RAG_MIN_CLUSTER_SIZE") {
            if let Ok(v) = val.parse() {
                config.clustering.min_cluster_size = v;
            }
        }
        if let Ok(val) = std::env::var("PARTICIPANT_RAG_MIN_SAMPLES") {
            if let Ok(v) = val.parse() {
                config.clustering.min_samples = v;
            }
        }
        if let Ok(val) = std::env::var("PARTICIPANT_RAG_EMBED_BATCH_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.clustering.embed_batch_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("PARTICIPANT_RAG_PERSIST_CHUNK_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.clustering.persist_chunk_size = v.max(1);
            }
        }
        if let Ok(val) = std::env::var("PARTICIPANT_RAG_SEED") {
            if let Ok(v) = val.parse() {
                config.clustering.seed = v;
            }
        }

        config
    }

    pub fn participants_path(&self) -> PathBuf {
        self.data_dir.join("participants.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("rag_index.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cluster_cache.json")
    }
}

use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use participant_rag::api;
use participant_rag::config::Config;
use participant_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/umap-cache", post(api::cache::generate_cache))
        .route("/api/umap-cache/status", get(api::cache::cache_status))
        .route("/api/umap-cache/points", get(api::cache::cached_points))
        .route("/api/clusters/run", post(api::clusters::run_clustering))
        .route("/api/clusters/cached", get(api::clusters::cached_clusters))
        .route("/api/clusters/insights", post(api::clusters::cluster_insights))
        .route("/api/participants/similar", post(api::search::similar))
        .route("/api/participants/reindex", post(api::participants::reindex))
        .route("/api/participants/{id}/index", post(api::participants::index_one))
        .route("/api/participants/{id}/text", get(api::participants::participant_text))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

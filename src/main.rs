use std::sync::Arc;

use anyhow::{ Context, Result };
use tracing_subscriber::EnvFilter;

mod api;
mod collection;
mod config;
mod embedding;
mod error;
mod indexer;
mod models;

use api::{ create_app, AppState };
use collection::{ SurrealCollection, VectorCollection };
use config::Config;
use embedding::ClipEmbedder;
use indexer::Indexer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber
        ::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting with {:?}", config);

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db_path = config.db_path.to_string_lossy().to_string();
    let collection: Arc<dyn VectorCollection> = Arc::new(SurrealCollection::open(&db_path).await?);

    tracing::info!("Loading CLIP models...");
    let embedder = Arc::new(ClipEmbedder::new()?);

    if let Some(index_dir) = config.index_dir.clone() {
        let indexer = Indexer::new(embedder.clone(), embedder.clone(), collection.clone());
        indexer
            .index_directory(index_dir.clone()).await
            .with_context(|| format!("Failed to index {}", index_dir.display()))?;
    }
    tracing::info!("Collection holds {} documents", collection.count().await?);

    if !config.image_dir.is_dir() {
        tracing::warn!("Image directory {} does not exist", config.image_dir.display());
    }

    let state = AppState {
        embedder,
        collection,
    };
    let app = create_app(state, &config.image_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Multimodal RAG API listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

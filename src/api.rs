use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{ get, post };
use axum::{ Form, Json, Router };
use serde_json::{ json, Value };
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::collection::VectorCollection;
use crate::embedding::TextEmbedder;
use crate::error::RagError;
use crate::indexer::IMAGE_EXTENSIONS;
use crate::models::{ Metadata, SearchForm, SearchItem, SearchResponse };

pub const IMAGE_ROUTE: &str = "/images";

#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn TextEmbedder>,
    pub collection: Arc<dyn VectorCollection>,
}

pub fn create_app(state: AppState, image_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/search", post(search_handler))
        .nest_service(IMAGE_ROUTE, ServeDir::new(image_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Multimodal RAG API is running!" }))
}

/// POST /search
///
/// Form fields: `query` (required), `n_results` (default 5). Responds with
/// `{query, results}` where each result is tagged `image` or `text`.
pub async fn search_handler(
    State(state): State<AppState>,
    Form(form): Form<SearchForm>
) -> Result<Json<SearchResponse>, RagError> {
    if form.query.trim().is_empty() {
        tracing::warn!("Rejected empty query");
        return Err(RagError::EmptyQuery);
    }
    if form.n_results == 0 {
        return Err(RagError::InvalidResultCount);
    }

    tracing::info!("Searching '{}' (n_results={})", form.query, form.n_results);

    let embedder = state.embedder.clone();
    let text = form.query.clone();
    let embedding = tokio::task::spawn_blocking(move || embedder.embed_text(&text)).await??;

    let pairs = state.collection
        .query(&[embedding], form.n_results).await?
        .into_first_pairs()?;

    let results: Vec<SearchItem> = pairs
        .into_iter()
        .map(|(document, metadata)| classify(document, &metadata))
        .collect();

    tracing::info!("Search complete: {} results for '{}'", results.len(), form.query);

    Ok(
        Json(SearchResponse {
            query: form.query,
            results,
        })
    )
}

fn has_image_extension(document: &str) -> bool {
    let lower = document.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Image documents are paths; only ones that still exist on disk are served.
pub fn classify(document: String, metadata: &Metadata) -> SearchItem {
    let source = metadata
        .get("source")
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    if has_image_extension(&document) && Path::new(&document).exists() {
        let filename = Path::new(&document)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| document.clone());

        SearchItem::Image {
            source,
            path: format!("{}/{}", IMAGE_ROUTE, filename),
        }
    } else {
        SearchItem::Text {
            source,
            text: document,
        }
    }
}

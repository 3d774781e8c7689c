use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),
    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),
    #[error("Malformed query results: {0}")]
    ResultShape(String),
    #[error("Query is empty")]
    EmptyQuery,
    #[error("n_results must be a positive integer")]
    InvalidResultCount,
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RagError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RagError::EmptyQuery | RagError::InvalidResultCount => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_client_error() {
            self.to_string()
        } else {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

//! API routes for the document server

pub mod files;
pub mod search;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Files - upload with larger body limit
        .route(
            "/files",
            get(files::list_files)
                .post(files::upload_file)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/files/:id", get(files::get_file).delete(files::delete_file))
        .route("/files/:id/state", get(files::get_state))
        .route("/files/:id/pages", get(files::get_pages))
        .route("/files/:id/blob", get(files::get_blob))
        .route("/files/:id/schedule", post(files::schedule_file))
        .route("/files/:id/reindex", post(files::reindex_file))
        .route("/files/:id/vector-count", get(files::vector_count))
        // Search
        .route("/search/semantic", get(search::semantic))
        .route("/search/keyword", get(search::keyword))
        .route("/search/hybrid", get(search::hybrid))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "ocr-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "OCR ingestion with hybrid dense+sparse retrieval",
        "endpoints": {
            "POST /api/files": "Upload a file (multipart field 'file') and schedule extraction",
            "GET /api/files": "List files",
            "GET /api/files/:id": "File metadata",
            "GET /api/files/:id/state": "Parsing state",
            "GET /api/files/:id/pages": "Extracted page text",
            "GET /api/files/:id/blob": "Original upload",
            "DELETE /api/files/:id": "Delete a file, its text and vectors",
            "POST /api/files/:id/schedule": "Retry scheduling a pending file",
            "POST /api/files/:id/reindex": "Rebuild vectors from stored text",
            "GET /api/files/:id/vector-count": "Indexed pages for a file",
            "GET /api/search/semantic": "Dense search (q, limit, threshold)",
            "GET /api/search/keyword": "Sparse search (q, limit, threshold)",
            "GET /api/search/hybrid": "Weighted merge (q, limit, semantic_weight, keyword_weight)"
        }
    }))
}

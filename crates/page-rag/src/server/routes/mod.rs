//! API routes for the RAG server

pub mod chat;
pub mod index;
pub mod retrieve;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::types::IndexStats;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Indexing
        .route("/index", post(index::index_document))
        .route("/index/:document_id", get(index::index_status))
        // Retrieval and answers
        .route("/retrieve", post(retrieve::retrieve))
        .route("/chat", post(chat::chat))
        // Info
        .route("/stats", get(stats))
        .route("/info", get(info))
}

/// GET /api/stats - Index sizes
async fn stats(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.pipeline().stats())
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(serde_json::json!({
        "name": "page-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multimodal RAG over PDF page images",
        "endpoints": {
            "POST /api/index": "Rasterize and index a document by path",
            "GET /api/index/:document_id": "Pages of a document present in each index",
            "POST /api/retrieve": "Retrieve page images (summary_embedding, visual_multi_vector, fusion)",
            "POST /api/chat": "Answer a question over retrieved pages",
            "GET /api/stats": "Index sizes"
        },
        "models": {
            "chat": state.chat_model(),
            "summary": config.llm.summary_model,
            "text_encoder": config.embeddings.model,
            "visual_encoder": config.visual_encoder.model
        },
        "retrieval": {
            "default_top_k": config.retrieval.default_top_k,
            "fusion_depth": config.retrieval.fusion_depth
        }
    }))
}

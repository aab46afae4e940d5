//! Indexing endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{IndexRequest, IndexStatus, IndexedDocument};

/// POST /api/index - Rasterize and index a document readable by the server
pub async fn index_document(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexedDocument>> {
    if !request.document_path.is_file() {
        return Err(Error::InvalidRequest(format!(
            "Document not found: {}",
            request.document_path.display()
        )));
    }

    tracing::info!("Index request: {}", request.document_path.display());

    let indexed = state
        .pipeline()
        .add_to_index_with(&request.document_path, request.target)
        .await?;

    Ok(Json(indexed))
}

/// GET /api/index/:document_id - Duplicate pre-check
pub async fn index_status(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Json<IndexStatus> {
    Json(state.pipeline().index_status(&document_id))
}

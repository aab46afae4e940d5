//! Retrieval endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{RetrieveRequest, RetrieveResponse};

/// POST /api/retrieve - Ranked page images for a query
pub async fn retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>> {
    tracing::info!("Retrieve ({}): \"{}\"", request.strategy, request.query);

    let response = state.pipeline().handle_retrieve(&request).await?;

    tracing::info!(
        "Retrieved {} pages in {}ms",
        response.hits.len(),
        response.processing_time_ms
    );

    Ok(Json(response))
}

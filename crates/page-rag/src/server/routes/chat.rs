//! Conversational answer endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::generation::Answer;
use crate::server::state::AppState;
use crate::types::ChatRequest;

/// POST /api/chat - Answer the latest question over retrieved pages
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Answer>> {
    tracing::info!("Chat ({}): \"{}\"", request.strategy, request.question);

    let answer = state.answers().answer(&request).await?;
    Ok(Json(answer))
}

//! Conversational answers grounded in retrieved page images

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::providers::image::encode_image_data_url;
use crate::providers::ChatProvider;
use crate::retrieval::RetrievalPipeline;
use crate::types::{ChatMessage, ChatRequest, ContentPart, PageHit};

use super::prompt::SYSTEM_PROMPT;

/// Answer to one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Assistant reply
    pub text: String,
    /// Pages shown to the model, in the order they were attached
    pub sources: Vec<PageHit>,
    /// Conversation including the new question and the reply
    ///
    /// Images are not kept in the history; every turn attaches the pages
    /// retrieved for its own question.
    pub history: Vec<ChatMessage>,
    pub processing_time_ms: u64,
}

/// Retrieves pages for a question and asks the chat model about them
pub struct AnswerGenerator {
    pipeline: Arc<RetrievalPipeline>,
    chat: Arc<dyn ChatProvider>,
}

impl AnswerGenerator {
    pub fn new(pipeline: Arc<RetrievalPipeline>, chat: Arc<dyn ChatProvider>) -> Self {
        Self { pipeline, chat }
    }

    pub async fn answer(&self, request: &ChatRequest) -> Result<Answer> {
        let start = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("Question cannot be empty".to_string()));
        }

        let top_k = request.top_k.unwrap_or_else(|| self.pipeline.default_top_k());
        let sources = self
            .pipeline
            .retrieve_hits(question, request.strategy, top_k)
            .await?;

        let mut history = request.history.clone();
        history.push(ChatMessage::user(question));

        let mut images = Vec::with_capacity(sources.len());
        for hit in &sources {
            images.push(encode_image_data_url(&hit.path).await?);
        }

        let messages = build_messages(&history, images);

        tracing::info!(
            "Answering with {} ({} pages attached, {} prior turns)",
            self.chat.model(),
            sources.len(),
            request.history.len()
        );

        let text = self.chat.complete(&messages).await?;
        history.push(ChatMessage::assistant(text.clone()));

        Ok(Answer {
            text,
            sources,
            history,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// System prompt, then the history with images attached to its last message
fn build_messages(history: &[ChatMessage], images: Vec<String>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());

    if let Some(last) = messages.last_mut() {
        last.content
            .extend(images.into_iter().map(|image_url| ContentPart::ImageUrl { image_url }));
    }

    messages
}

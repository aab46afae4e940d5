//! Mistral chat-completions client for answers and page summaries

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::prompt::{SUMMARY_PROMPT, SUMMARY_REQUEST};
use crate::types::ChatMessage;

use super::image::encode_image_data_url;
use super::llm::ChatProvider;
use super::retry::retry_request;
use super::summarizer::Summarizer;

/// Mistral API client with automatic retry
pub struct MistralClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl MistralClient {
    /// Create a new client; the request timeout bounds every model call
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Run one chat completion against `model` with retry
    pub async fn chat_completion(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            Error::Config("MISTRAL_API_KEY is not set".to_string())
        })?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(
            "Chat completion with model {} ({} messages)",
            model,
            messages.len()
        );

        retry_request("Chat completion", self.config.max_retries, || {
            let request = CompletionRequest {
                model,
                messages,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };
            let url = url.clone();

            async move {
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::Llm(format!("Completion request failed: {}", e)))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(status, body));
                }

                let completion: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Llm(format!("Failed to parse completion: {}", e)))?;

                completion
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| Error::Llm("Completion returned no choices".to_string()))
            }
        })
        .await
    }
}

/// Throttling and server errors are retryable; other rejections are not
fn classify_status(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Config(format!("Mistral API rejected credentials: HTTP {}", status))
        }
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
            Error::Llm(format!("Completion failed: HTTP {} - {}", status, body))
        }
        _ => Error::InvalidRequest(format!("Completion rejected: HTTP {} - {}", status, body)),
    }
}

#[async_trait]
impl ChatProvider for MistralClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat_completion(&self.config.chat_model, messages).await
    }

    fn name(&self) -> &str {
        "mistral"
    }

    fn model(&self) -> &str {
        &self.config.chat_model
    }
}

#[async_trait]
impl Summarizer for MistralClient {
    async fn summarize(&self, image_path: &Path) -> Result<String> {
        let image = encode_image_data_url(image_path)
            .await
            .map_err(|e| Error::summarization(e.to_string()))?;

        let messages = [
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(SUMMARY_REQUEST).with_image(image),
        ];

        let summary = self
            .chat_completion(&self.config.summary_model, &messages)
            .await
            .map_err(|e| Error::summarization(format!("{}: {}", image_path.display(), e)))?;

        if summary.trim().is_empty() {
            return Err(Error::summarization(format!(
                "{}: model returned an empty summary",
                image_path.display()
            )));
        }

        Ok(summary)
    }

    fn name(&self) -> &str {
        "mistral"
    }
}

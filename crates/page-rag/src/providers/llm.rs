//! Chat provider trait for answer generation

use async_trait::async_trait;
use crate::error::Result;
use crate::types::ChatMessage;

/// Trait for vision-capable chat completion
///
/// Implementations:
/// - `MistralClient`: Mistral chat-completions API (pixtral)
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete a conversation; images travel inside the message parts
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

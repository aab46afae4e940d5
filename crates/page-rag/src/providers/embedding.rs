//! Text encoder trait for the summary index

use async_trait::async_trait;
use crate::error::Result;

/// Trait for generating fixed-dimension text embeddings
///
/// Implementations:
/// - `OnnxTextEncoder`: local ONNX Runtime session (bge-m3)
/// - `OllamaEmbedder`: local Ollama server
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions (1024 for bge-m3)
    fn dimensions(&self) -> usize;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

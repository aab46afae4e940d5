//! Page image summarization for the summary index

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Turns a page image into a short retrieval-oriented description
///
/// Failures surface as `Error::Summarization`; retrying is the caller's call.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, image_path: &Path) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

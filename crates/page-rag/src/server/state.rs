//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::AnswerGenerator;
use crate::providers::{ChatProvider, MistralClient};
use crate::retrieval::RetrievalPipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    pipeline: Arc<RetrievalPipeline>,
    answers: AnswerGenerator,
    /// Chat model name, for `/api/info`
    chat_model: String,
}

impl AppState {
    /// Load both indices and connect the production model clients
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing page-rag state (data dir: {})",
            config.storage.data_dir.display()
        );

        let pipeline = Arc::new(RetrievalPipeline::from_config(&config).await?);
        let chat: Arc<dyn ChatProvider> = Arc::new(MistralClient::new(&config.llm)?);

        if config.llm.api_key.is_none() {
            tracing::warn!("MISTRAL_API_KEY is not set; indexing and chat requests will fail");
        }

        let stats = pipeline.stats();
        tracing::info!(
            "Loaded {} summary entries and {} visual entries across {} documents",
            stats.summary_entries,
            stats.visual_entries,
            stats.documents
        );

        Ok(Self::from_parts(config, pipeline, chat))
    }

    /// Assemble state from an existing pipeline and chat provider
    pub fn from_parts(
        config: RagConfig,
        pipeline: Arc<RetrievalPipeline>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        let chat_model = chat.model().to_string();
        let answers = AnswerGenerator::new(Arc::clone(&pipeline), chat);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                answers,
                chat_model,
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &RetrievalPipeline {
        &self.inner.pipeline
    }

    pub fn answers(&self) -> &AnswerGenerator {
        &self.inner.answers
    }

    pub fn chat_model(&self) -> &str {
        &self.inner.chat_model
    }
}

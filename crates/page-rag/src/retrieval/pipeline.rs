//! Dual-strategy retrieval pipeline

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::{EmbeddingBackend, RagConfig, RetrievalConfig};
use crate::error::{Error, Result};
use crate::index::{SummaryIndex, VisualIndex};
use crate::ingestion::{PdftoppmRasterizer, Rasterizer};
use crate::providers::{
    HttpVisualEncoder, MistralClient, OllamaEmbedder, OnnxTextEncoder, Summarizer, TextEncoder,
    VisualEncoder,
};
use crate::storage::ImageStore;
use crate::types::{
    document_id_from_path, IndexStats, IndexStatus, IndexTarget, IndexedDocument, PageHit, PageRef,
    RetrievalStrategy, RetrieveRequest, RetrieveResponse,
};

use super::fusion::{best_of_each, dedup_by_path};

/// External collaborators the pipeline is built from
pub struct PipelineComponents {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub summarizer: Arc<dyn Summarizer>,
    pub text_encoder: Arc<dyn TextEncoder>,
    pub visual_encoder: Arc<dyn VisualEncoder>,
}

impl PipelineComponents {
    /// Production collaborators for `config`
    pub async fn from_config(config: &RagConfig, images: &ImageStore) -> Result<Self> {
        let text_encoder: Arc<dyn TextEncoder> = match config.embeddings.backend {
            EmbeddingBackend::Onnx => Arc::new(OnnxTextEncoder::new(&config.embeddings).await?),
            EmbeddingBackend::Ollama => {
                let embedder = OllamaEmbedder::new(&config.embeddings)?;
                if !embedder.health_check().await {
                    tracing::warn!(
                        "Ollama not reachable at {}; summary indexing will fail until it is",
                        config.embeddings.ollama_url
                    );
                }
                Arc::new(embedder)
            }
        };

        Ok(Self {
            rasterizer: Arc::new(PdftoppmRasterizer::new(
                config.rasterizer.clone(),
                images.clone(),
            )),
            summarizer: Arc::new(MistralClient::new(&config.llm)?),
            text_encoder,
            visual_encoder: Arc::new(HttpVisualEncoder::new(&config.visual_encoder)?),
        })
    }
}

/// Indexes documents under both strategies and answers queries with either or both
///
/// Adds are serialized pipeline-wide; searches run concurrently with each
/// other.
pub struct RetrievalPipeline {
    images: ImageStore,
    rasterizer: Arc<dyn Rasterizer>,
    summary: SummaryIndex,
    visual: VisualIndex,
    retrieval: RetrievalConfig,
    add_lock: Mutex<()>,
}

impl RetrievalPipeline {
    /// Open both indices under `config.storage.data_dir`
    pub fn new(config: &RagConfig, components: PipelineComponents) -> Result<Self> {
        config.validate()?;

        if components.text_encoder.dimensions() != config.embeddings.dimensions {
            return Err(Error::Config(format!(
                "text encoder {} produces {} dimensions but embeddings.dimensions is {}",
                components.text_encoder.name(),
                components.text_encoder.dimensions(),
                config.embeddings.dimensions
            )));
        }

        let images = ImageStore::new(config.storage.images_dir())?;

        let summary = SummaryIndex::open(
            config.storage.summary_index_dir(),
            images.clone(),
            components.summarizer,
            components.text_encoder,
        )?;

        let visual = VisualIndex::open(
            config.storage.visual_index_dir(),
            images.clone(),
            components.visual_encoder,
            config.visual_index.chunk_size,
        )?;

        Ok(Self {
            images,
            rasterizer: components.rasterizer,
            summary,
            visual,
            retrieval: config.retrieval.clone(),
            add_lock: Mutex::new(()),
        })
    }

    /// Build the pipeline with production collaborators
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let images = ImageStore::new(config.storage.images_dir())?;
        let components = PipelineComponents::from_config(config, &images).await?;
        Self::new(config, components)
    }

    /// Whether documents can be indexed right now
    pub async fn is_ready(&self) -> bool {
        self.rasterizer.is_available().await
    }

    /// `top_k` used when a request does not give one
    pub fn default_top_k(&self) -> usize {
        self.retrieval.default_top_k
    }

    /// Rasterize a document and index every page under both strategies
    pub async fn add_to_index(&self, document_path: &Path) -> Result<IndexedDocument> {
        self.add_to_index_with(document_path, IndexTarget::All).await
    }

    /// Rasterize a document and index every page under the selected strategies
    ///
    /// Pages go in ascending order, summary index before visual index. The
    /// first failure aborts the remaining pages. A visual failure on a page
    /// the summary index already took is reported as `PartialIndex`.
    /// Already-indexed pages are not skipped; see [`Self::index_status`].
    pub async fn add_to_index_with(
        &self,
        document_path: &Path,
        target: IndexTarget,
    ) -> Result<IndexedDocument> {
        let start = Instant::now();
        let document_id = document_id_from_path(document_path)?;

        let _guard = self.add_lock.lock().await;

        tracing::info!(
            "Indexing {} as '{}' ({:?}) with {}",
            document_path.display(),
            document_id,
            target,
            self.rasterizer.name()
        );

        let pages = self.rasterizer.rasterize(document_path).await?;

        let mut summary_pages_added = 0;
        let mut visual_pages_added = 0;

        for page in &pages {
            if target.includes_summary() {
                self.summary.add(page).await?;
                summary_pages_added += 1;
            }

            if target.includes_visual() {
                if let Err(source) = self.visual.add(page).await {
                    if !target.includes_summary() {
                        return Err(source);
                    }

                    let page_number = PageRef::from_image_path(page)
                        .map(|p| p.page_number)
                        .unwrap_or(summary_pages_added as u32);

                    tracing::warn!(
                        "Document '{}' partially indexed: page {} in summary index only ({})",
                        document_id,
                        page_number,
                        source
                    );

                    return Err(Error::PartialIndex {
                        document_id,
                        page_number,
                        indexed: RetrievalStrategy::SummaryEmbedding,
                        failed: RetrievalStrategy::VisualMultiVector,
                        source: Box::new(source),
                    });
                }
                visual_pages_added += 1;
            }
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed '{}': {} pages ({} summary, {} visual) in {}ms",
            document_id,
            pages.len(),
            summary_pages_added,
            visual_pages_added,
            processing_time_ms
        );

        Ok(IndexedDocument {
            document_id,
            pages,
            target,
            summary_pages_added,
            visual_pages_added,
            processing_time_ms,
        })
    }

    /// Which pages of a document each index already holds
    pub fn index_status(&self, document_id: &str) -> IndexStatus {
        IndexStatus {
            document_id: document_id.to_string(),
            summary_pages: self.summary.pages_of(document_id),
            visual_pages: self.visual.pages_of(document_id),
            images: self.images.pages(document_id).unwrap_or_default(),
        }
    }

    /// Text a page was embedded from in the summary index
    pub fn summary_of(&self, page: &PageRef) -> Option<String> {
        self.summary.summary_of(page)
    }

    /// Ranked, deduplicated page image paths for a query
    pub async fn retrieve(
        &self,
        query: &str,
        strategy: RetrievalStrategy,
        top_k: usize,
    ) -> Result<Vec<PathBuf>> {
        Ok(self
            .retrieve_hits(query, strategy, top_k)
            .await?
            .into_iter()
            .map(|hit| hit.path)
            .collect())
    }

    /// Like [`Self::retrieve`] but keeps scores and provenance
    ///
    /// `Fusion` takes the top `fusion_depth` hits of each strategy regardless
    /// of `top_k` and fails if either strategy fails.
    pub async fn retrieve_hits(
        &self,
        query: &str,
        strategy: RetrievalStrategy,
        top_k: usize,
    ) -> Result<Vec<PageHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("Query cannot be empty".to_string()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = match strategy {
            RetrievalStrategy::SummaryEmbedding => self.summary.search(query, top_k).await?,
            RetrievalStrategy::VisualMultiVector => self.visual.search(query, top_k).await?,
            RetrievalStrategy::Fusion => {
                let depth = self.retrieval.fusion_depth;
                let (summary, visual) = tokio::try_join!(
                    self.summary.search(query, depth),
                    self.visual.search(query, depth)
                )?;
                best_of_each(summary, visual, depth)
            }
        };

        tracing::debug!(
            "Retrieved {} pages for '{}' with {}",
            hits.len(),
            query,
            strategy
        );

        Ok(dedup_by_path(hits))
    }

    /// Serve a retrieval request, filling in the default `top_k`
    pub async fn handle_retrieve(&self, request: &RetrieveRequest) -> Result<RetrieveResponse> {
        let start = Instant::now();
        let top_k = request.top_k.unwrap_or(self.retrieval.default_top_k);
        let hits = self
            .retrieve_hits(&request.query, request.strategy, top_k)
            .await?;

        Ok(RetrieveResponse {
            query: request.query.clone(),
            strategy: request.strategy,
            hits,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub fn stats(&self) -> IndexStats {
        let documents: BTreeSet<String> = self
            .summary
            .entries()
            .into_iter()
            .chain(self.visual.entries())
            .map(|e| e.document_id)
            .collect();

        IndexStats {
            summary_entries: self.summary.len(),
            visual_entries: self.visual.len(),
            visual_chunks: self.visual.chunk_count(),
            documents: documents.len(),
        }
    }
}

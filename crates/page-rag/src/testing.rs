//! In-process fakes for the external models
//!
//! Page "images" are plain text files. A page may carry two texts split by
//! `|`: the part before it is what the summarizer sees, the part after it
//! is what the visual encoder sees. Without a `|` both see the whole text.
//! Fake PDFs are text files with pages separated by form feeds.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::index::MultiVector;
use crate::ingestion::Rasterizer;
use crate::providers::{ChatProvider, Summarizer, TextEncoder, VisualEncoder};
use crate::storage::ImageStore;
use crate::types::{document_id_from_path, ChatMessage, PageRef};

pub const TEST_DIMENSIONS: usize = 64;

const PAGE_BREAK: char = '\x0c';

/// Config rooted in a temp dir with small test dimensions
pub fn test_config(data_dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.embeddings.dimensions = TEST_DIMENSIONS;
    config
}

/// Write a page "image" into the store layout
pub fn write_page(images: &ImageStore, document_id: &str, page_number: u32, text: &str) -> PathBuf {
    let path = images.page_path(&PageRef::new(document_id, page_number));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

/// Write a fake multi-page PDF
pub fn write_document(dir: &Path, file_name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, pages.join(&PAGE_BREAK.to_string())).unwrap();
    path
}

fn page_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidRequest(format!("unreadable page {}: {}", path.display(), e)))
}

fn summary_side(text: &str) -> &str {
    text.split_once('|').map(|(a, _)| a).unwrap_or(text).trim()
}

fn visual_side(text: &str) -> &str {
    text.split_once('|').map(|(_, b)| b).unwrap_or(text).trim()
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Collision-free word ids (until the vocabulary outgrows the dimensions)
#[derive(Default)]
struct Vocab {
    ids: Mutex<HashMap<String, usize>>,
}

impl Vocab {
    fn id(&self, token: &str, dims: usize) -> usize {
        let mut ids = self.ids.lock();
        let next = ids.len();
        *ids.entry(token.to_string()).or_insert(next) % dims
    }
}

/// Splits the fake PDF on form feeds and writes one page file per part
pub struct FakeRasterizer {
    images: ImageStore,
}

impl FakeRasterizer {
    pub fn new(images: ImageStore) -> Self {
        Self { images }
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, document_path: &Path) -> Result<Vec<PathBuf>> {
        let name = document_path.display().to_string();
        let raw = std::fs::read_to_string(document_path)
            .map_err(|e| Error::rasterization(&name, e.to_string()))?;
        if raw.trim().is_empty() {
            return Err(Error::rasterization(name, "document has no pages"));
        }

        let id = document_id_from_path(document_path)?;
        Ok(raw
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, text)| write_page(&self.images, &id, i as u32 + 1, text))
            .collect())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Returns the summary side of the page text
pub struct FakeSummarizer;

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, image_path: &Path) -> Result<String> {
        let text = page_text(image_path).map_err(|e| Error::summarization(e.to_string()))?;
        let summary = summary_side(&text);
        if summary.is_empty() {
            return Err(Error::summarization("empty page"));
        }
        Ok(summary.to_string())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _image_path: &Path) -> Result<String> {
        Err(Error::summarization("summarizer unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Normalized bag-of-words embedding
pub struct VocabTextEncoder {
    dims: usize,
    vocab: Vocab,
    calls: AtomicUsize,
}

impl VocabTextEncoder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vocab: Vocab::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextEncoder for VocabTextEncoder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut v = vec![0.0f32; self.dims];
        for token in tokens(text) {
            v[self.vocab.id(&token, self.dims)] += 1.0;
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "vocab"
    }
}

/// One one-hot patch vector per word of the visual side
pub struct VocabVisualEncoder {
    dims: usize,
    vocab: Vocab,
    calls: AtomicUsize,
}

impl VocabVisualEncoder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vocab: Vocab::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn encode(&self, text: &str) -> Result<MultiVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rows = tokens(text)
            .iter()
            .map(|token| {
                let mut row = vec![0.0f32; self.dims];
                row[self.vocab.id(token, self.dims)] = 1.0;
                row
            })
            .collect();
        MultiVector::from_rows(rows)
    }
}

#[async_trait]
impl VisualEncoder for VocabVisualEncoder {
    async fn embed_image(&self, image_path: &Path) -> Result<MultiVector> {
        let text = page_text(image_path).map_err(|e| Error::encoding(e.to_string()))?;
        self.encode(visual_side(&text))
    }

    async fn embed_query(&self, query: &str) -> Result<MultiVector> {
        self.encode(query)
    }

    fn name(&self) -> &str {
        "vocab"
    }
}

pub struct FailingVisualEncoder;

#[async_trait]
impl VisualEncoder for FailingVisualEncoder {
    async fn embed_image(&self, _image_path: &Path) -> Result<MultiVector> {
        Err(Error::encoding("visual encoder unavailable"))
    }

    async fn embed_query(&self, _query: &str) -> Result<MultiVector> {
        Err(Error::encoding("visual encoder unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Records every conversation it is sent and replies with a fixed text
#[derive(Default)]
pub struct RecordingChat {
    pub received: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatProvider for RecordingChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.received.lock().push(messages.to_vec());
        Ok("The report shows revenue growth.".to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "recording-model"
    }
}

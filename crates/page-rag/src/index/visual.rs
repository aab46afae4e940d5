//! Visual multi-vector index
//!
//! Pages are embedded straight from pixels into one vector per image patch
//! and scored against query token vectors with MaxSim.
//!
//! Embedding sets are persisted in chunk files under `embeddings/`, each
//! named by the global offset of its first set and holding at most
//! `chunk_size` sets. Only the last chunk is ever rewritten. The metadata
//! log `docs_meta.json` lines up with the concatenation of all chunks.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::providers::VisualEncoder;
use crate::storage::{read_json_or_default, write_atomic, write_json_atomic, ImageStore};
use crate::types::{IndexEntry, PageHit, PageRef, RetrievalStrategy};

use super::similarity::{max_sim, rank};
use super::MultiVector;

const META_FILE: &str = "docs_meta.json";
const CHUNK_DIR: &str = "embeddings";
const CHUNK_PREFIX: &str = "embeddings_";
const CHUNK_EXTENSION: &str = "bin";
const INDEX_NAME: &str = "visual";

/// Self-contained slice of the embedding sequence
#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingChunk {
    start: usize,
    embeddings: Vec<MultiVector>,
}

fn chunk_file_name(start: usize) -> String {
    format!("{}{:010}.{}", CHUNK_PREFIX, start, CHUNK_EXTENSION)
}

fn parse_chunk_start(path: &Path) -> Option<usize> {
    if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(CHUNK_PREFIX)?
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
struct VisualRecord {
    entry: IndexEntry,
    embedding: MultiVector,
}

#[derive(Debug, Default)]
struct VisualState {
    records: Vec<VisualRecord>,
    /// Start offsets of the chunk files, ascending
    chunk_starts: Vec<usize>,
}

impl VisualState {
    /// Start of the chunk the next set goes into
    fn next_chunk_start(&self, chunk_size: usize) -> usize {
        let len = self.records.len();
        match self.chunk_starts.last() {
            Some(&start) if len - start < chunk_size => start,
            _ => len,
        }
    }

    /// Width shared by every stored set
    fn dim(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.dim())
    }
}

/// Strategy B index
pub struct VisualIndex {
    dir: PathBuf,
    images: ImageStore,
    encoder: Arc<dyn VisualEncoder>,
    chunk_size: usize,
    state: Arc<RwLock<VisualState>>,
    /// Serializes persist-then-append
    commit: Mutex<()>,
}

impl VisualIndex {
    /// Open the index stored in `dir`, creating an empty one if absent
    pub fn open(
        dir: impl Into<PathBuf>,
        images: ImageStore,
        encoder: Arc<dyn VisualEncoder>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("visual index chunk size must be > 0".to_string()));
        }

        let dir = dir.into();
        std::fs::create_dir_all(dir.join(CHUNK_DIR))?;

        let state = load_state(&dir)?;

        tracing::info!(
            "Opened visual index at {} ({} entries in {} chunks, encoder {})",
            dir.display(),
            state.records.len(),
            state.chunk_starts.len(),
            encoder.name()
        );

        Ok(Self {
            dir,
            images,
            encoder,
            chunk_size,
            state: Arc::new(RwLock::new(state)),
            commit: Mutex::new(()),
        })
    }

    /// Embed and append one page image
    pub async fn add(&self, image_path: &Path) -> Result<IndexEntry> {
        let entry = IndexEntry::for_image(image_path)?;
        let embedding = self.encoder.embed_image(image_path).await?;

        let _commit = self.commit.lock().await;

        let (start, meta, tail) = {
            let state = self.state.read();

            if let Some(dim) = state.dim() {
                if embedding.dim() != dim {
                    return Err(Error::encoding(format!(
                        "visual encoder returned {}-dimensional vectors, index holds {}",
                        embedding.dim(),
                        dim
                    )));
                }
            }

            let start = state.next_chunk_start(self.chunk_size);
            let meta: Vec<IndexEntry> = state.records.iter().map(|r| r.entry.clone()).collect();
            let tail: Vec<MultiVector> = state.records[start..]
                .iter()
                .map(|r| r.embedding.clone())
                .collect();
            (start, meta, tail)
        };

        let record = VisualRecord {
            entry: entry.clone(),
            embedding,
        };

        let dir = self.dir.clone();
        let pending = record.clone();
        tokio::task::spawn_blocking(move || persist(&dir, meta, tail, pending, start))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let mut state = self.state.write();
        let position = state.records.len();
        state.records.push(record);
        if state.chunk_starts.last() != Some(&start) {
            state.chunk_starts.push(start);
        }

        tracing::debug!(
            "Visual index: added {} at position {} (chunk {})",
            entry.page_ref(),
            position,
            start
        );

        Ok(entry)
    }

    /// Top `top_k` distinct pages by MaxSim against the query's token vectors
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<PageHit>> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = self.encoder.embed_query(query).await?;

        let state = Arc::clone(&self.state);
        let images = self.images.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<PageHit>> {
            let state = state.read();
            let scored = state
                .records
                .par_iter()
                .enumerate()
                .map(|(i, r)| max_sim(&query_vectors, &r.embedding).map(|score| (i, score)))
                .collect::<Result<Vec<_>>>()?;

            Ok(rank(scored, top_k, |i| state.records[i].entry.page_ref())
                .into_iter()
                .map(|(i, score)| {
                    let entry = &state.records[i].entry;
                    PageHit {
                        path: images.resolve(entry),
                        document_id: entry.document_id.clone(),
                        page_number: entry.page_number,
                        score,
                        strategy: RetrievalStrategy::VisualMultiVector,
                    }
                })
                .collect())
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Number of chunk files
    pub fn chunk_count(&self) -> usize {
        self.state.read().chunk_starts.len()
    }

    /// Metadata log in position order
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().records.iter().map(|r| r.entry.clone()).collect()
    }

    pub fn contains(&self, page: &PageRef) -> bool {
        self.state.read().records.iter().any(|r| r.entry.page_ref() == *page)
    }

    /// Indexed page numbers of a document, ascending and deduplicated
    pub fn pages_of(&self, document_id: &str) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .state
            .read()
            .records
            .iter()
            .filter(|r| r.entry.document_id == document_id)
            .map(|r| r.entry.page_number)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Write the log and the chunk starting at `start` as they will be once `new` is appended
///
/// `tail` holds the sets already in that chunk. If the chunk write fails
/// the previous log is put back.
fn persist(
    dir: &Path,
    mut meta: Vec<IndexEntry>,
    mut tail: Vec<MultiVector>,
    new: VisualRecord,
    start: usize,
) -> Result<()> {
    let meta_path = dir.join(META_FILE);

    tail.push(new.embedding);
    let chunk = bincode::serde::encode_to_vec(
        EmbeddingChunk {
            start,
            embeddings: tail,
        },
        bincode::config::standard(),
    )?;

    meta.push(new.entry);
    write_json_atomic(&meta_path, &meta)?;

    let chunk_path = dir.join(CHUNK_DIR).join(chunk_file_name(start));
    if let Err(e) = write_atomic(&chunk_path, &chunk) {
        meta.pop();
        if let Err(restore) = write_json_atomic(&meta_path, &meta) {
            tracing::error!(
                "Failed to restore visual metadata log after chunk write error: {}",
                restore
            );
        }
        return Err(e);
    }

    Ok(())
}

fn load_state(dir: &Path) -> Result<VisualState> {
    let meta: Vec<IndexEntry> = read_json_or_default(&dir.join(META_FILE))
        .map_err(|e| Error::corruption(INDEX_NAME, format!("unreadable metadata log: {}", e)))?;

    let mut chunk_files: Vec<(usize, PathBuf)> = WalkDir::new(dir.join(CHUNK_DIR))
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| parse_chunk_start(e.path()).map(|start| (start, e.into_path())))
        .collect();
    chunk_files.sort_by_key(|(start, _)| *start);

    let mut embeddings = Vec::with_capacity(meta.len());
    let mut chunk_starts = Vec::with_capacity(chunk_files.len());

    for (start, path) in chunk_files {
        if start != embeddings.len() {
            return Err(Error::corruption(
                INDEX_NAME,
                format!(
                    "chunk {} starts at {} but {} embedding sets precede it",
                    path.display(),
                    start,
                    embeddings.len()
                ),
            ));
        }

        let raw = std::fs::read(&path)?;
        let (chunk, _): (EmbeddingChunk, usize) =
            bincode::serde::decode_from_slice(&raw, bincode::config::standard()).map_err(|e| {
                Error::corruption(INDEX_NAME, format!("unreadable chunk {}: {}", path.display(), e))
            })?;

        if chunk.start != start {
            return Err(Error::corruption(
                INDEX_NAME,
                format!(
                    "chunk {} records start {} but is named for {}",
                    path.display(),
                    chunk.start,
                    start
                ),
            ));
        }
        if chunk.embeddings.is_empty() {
            return Err(Error::corruption(
                INDEX_NAME,
                format!("chunk {} is empty", path.display()),
            ));
        }

        for embedding in &chunk.embeddings {
            embedding.validate()?;
        }

        chunk_starts.push(start);
        embeddings.extend(chunk.embeddings);
    }

    if meta.len() != embeddings.len() {
        return Err(Error::corruption(
            INDEX_NAME,
            format!(
                "{} metadata entries but {} embedding sets",
                meta.len(),
                embeddings.len()
            ),
        ));
    }

    if let Some(first) = embeddings.first().map(|e| e.dim()) {
        if let Some(pos) = embeddings.iter().position(|e| e.dim() != first) {
            return Err(Error::corruption(
                INDEX_NAME,
                format!("embedding set {} does not have {} dimensions", pos, first),
            ));
        }
    }

    let records = meta
        .into_iter()
        .zip(embeddings)
        .map(|(entry, embedding)| VisualRecord { entry, embedding })
        .collect();

    Ok(VisualState {
        records,
        chunk_starts,
    })
}

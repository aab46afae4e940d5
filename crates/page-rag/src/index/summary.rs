//! Dense summary-embedding index
//!
//! Each page image is described in text by the summarizer, the description
//! is embedded with the text encoder, and queries are matched against those
//! embeddings by exact cosine k-NN.
//!
//! On disk the index is two files that must agree in length:
//! `docs_meta.json` (the metadata log, authoritative) and `vectors.bin`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::providers::{Summarizer, TextEncoder};
use crate::storage::{read_json_or_default, write_atomic, write_json_atomic, ImageStore};
use crate::types::{IndexEntry, PageHit, PageRef, RetrievalStrategy};

use super::similarity::{cosine_similarity, rank};

const META_FILE: &str = "docs_meta.json";
const VECTORS_FILE: &str = "vectors.bin";
const INDEX_NAME: &str = "summary";

/// Metadata log line: the entry plus the summary it was embedded from
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SummaryMeta {
    #[serde(flatten)]
    entry: IndexEntry,
    summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorFile {
    dimensions: usize,
    rows: Vec<Vec<f32>>,
}

/// One indexed page: metadata and vector live together
#[derive(Debug, Clone)]
struct SummaryRecord {
    meta: SummaryMeta,
    vector: Vec<f32>,
}

/// Strategy A index
pub struct SummaryIndex {
    dir: PathBuf,
    images: ImageStore,
    summarizer: Arc<dyn Summarizer>,
    encoder: Arc<dyn TextEncoder>,
    dimensions: usize,
    records: Arc<RwLock<Vec<SummaryRecord>>>,
    /// Serializes persist-then-append
    commit: Mutex<()>,
}

impl SummaryIndex {
    /// Open the index stored in `dir`, creating an empty one if absent
    ///
    /// Fails with `IndexCorruption` when the metadata log and vector file
    /// disagree.
    pub fn open(
        dir: impl Into<PathBuf>,
        images: ImageStore,
        summarizer: Arc<dyn Summarizer>,
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let dimensions = encoder.dimensions();
        let records = load_records(&dir, dimensions)?;

        tracing::info!(
            "Opened summary index at {} ({} entries, {} dimensions, encoder {}, summarizer {})",
            dir.display(),
            records.len(),
            dimensions,
            encoder.name(),
            summarizer.name()
        );

        Ok(Self {
            dir,
            images,
            summarizer,
            encoder,
            dimensions,
            records: Arc::new(RwLock::new(records)),
            commit: Mutex::new(()),
        })
    }

    /// Summarize, embed and append one page image
    ///
    /// Nothing is written unless summarization and embedding both succeed.
    pub async fn add(&self, image_path: &Path) -> Result<IndexEntry> {
        let entry = IndexEntry::for_image(image_path)?;

        let summary = self.summarizer.summarize(image_path).await?;
        let vector = self.encoder.embed(&summary).await?;
        self.check_vector(&vector, "text encoder returned")?;

        let record = SummaryRecord {
            meta: SummaryMeta {
                entry: entry.clone(),
                summary,
            },
            vector,
        };

        let _commit = self.commit.lock().await;

        let (meta, rows): (Vec<SummaryMeta>, Vec<Vec<f32>>) = self
            .records
            .read()
            .iter()
            .map(|r| (r.meta.clone(), r.vector.clone()))
            .unzip();

        let dir = self.dir.clone();
        let dimensions = self.dimensions;
        let pending = record.clone();
        tokio::task::spawn_blocking(move || persist(&dir, dimensions, meta, rows, pending))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let mut records = self.records.write();
        records.push(record);

        tracing::debug!(
            "Summary index: added {} at position {}",
            entry.page_ref(),
            records.len() - 1
        );

        Ok(entry)
    }

    fn check_vector(&self, vector: &[f32], what: &str) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::encoding(format!(
                "{} {} dimensions, index expects {}",
                what,
                vector.len(),
                self.dimensions
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::encoding(format!("{} non-finite values", what)));
        }
        Ok(())
    }

    /// Top `top_k` distinct pages by cosine similarity between query and summary
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<PageHit>> {
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.encoder.embed(query).await?;
        self.check_vector(&query_vector, "query embedding has")?;

        let records = Arc::clone(&self.records);
        let images = self.images.clone();
        tokio::task::spawn_blocking(move || -> Vec<PageHit> {
            let records = records.read();
            let scored = records
                .iter()
                .enumerate()
                .map(|(i, r)| (i, cosine_similarity(&query_vector, &r.vector)))
                .collect();

            rank(scored, top_k, |i| records[i].meta.entry.page_ref())
                .into_iter()
                .map(|(i, score)| {
                    let entry = &records[i].meta.entry;
                    PageHit {
                        path: images.resolve(entry),
                        document_id: entry.document_id.clone(),
                        page_number: entry.page_number,
                        score,
                        strategy: RetrievalStrategy::SummaryEmbedding,
                    }
                })
                .collect()
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Metadata log in position order
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.records.read().iter().map(|r| r.meta.entry.clone()).collect()
    }

    pub fn contains(&self, page: &PageRef) -> bool {
        self.records.read().iter().any(|r| r.meta.entry.page_ref() == *page)
    }

    /// Summary a page was indexed with (latest one if indexed twice)
    pub fn summary_of(&self, page: &PageRef) -> Option<String> {
        self.records
            .read()
            .iter()
            .rev()
            .find(|r| r.meta.entry.page_ref() == *page)
            .map(|r| r.meta.summary.clone())
    }

    /// Indexed page numbers of a document, ascending and deduplicated
    pub fn pages_of(&self, document_id: &str) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .records
            .read()
            .iter()
            .filter(|r| r.meta.entry.document_id == document_id)
            .map(|r| r.meta.entry.page_number)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Write the log and vectors as they will be once `new` is appended
///
/// The log goes first. If the vector write then fails the previous log is
/// put back so the two files agree again.
fn persist(
    dir: &Path,
    dimensions: usize,
    mut meta: Vec<SummaryMeta>,
    mut rows: Vec<Vec<f32>>,
    new: SummaryRecord,
) -> Result<()> {
    let meta_path = dir.join(META_FILE);

    rows.push(new.vector);
    let vectors = bincode::serde::encode_to_vec(
        VectorFile { dimensions, rows },
        bincode::config::standard(),
    )?;

    meta.push(new.meta);
    write_json_atomic(&meta_path, &meta)?;

    if let Err(e) = write_atomic(&dir.join(VECTORS_FILE), &vectors) {
        meta.pop();
        if let Err(restore) = write_json_atomic(&meta_path, &meta) {
            tracing::error!(
                "Failed to restore summary metadata log after vector write error: {}",
                restore
            );
        }
        return Err(e);
    }

    Ok(())
}

fn load_records(dir: &Path, dimensions: usize) -> Result<Vec<SummaryRecord>> {
    let meta: Vec<SummaryMeta> = read_json_or_default(&dir.join(META_FILE))
        .map_err(|e| Error::corruption(INDEX_NAME, format!("unreadable metadata log: {}", e)))?;

    let vectors_path = dir.join(VECTORS_FILE);
    let file = if vectors_path.exists() {
        let raw = std::fs::read(&vectors_path)?;
        let (file, _): (VectorFile, usize) =
            bincode::serde::decode_from_slice(&raw, bincode::config::standard()).map_err(|e| {
                Error::corruption(INDEX_NAME, format!("unreadable vector file: {}", e))
            })?;
        file
    } else {
        VectorFile {
            dimensions,
            rows: Vec::new(),
        }
    };

    if meta.len() != file.rows.len() {
        return Err(Error::corruption(
            INDEX_NAME,
            format!(
                "{} metadata entries but {} vectors",
                meta.len(),
                file.rows.len()
            ),
        ));
    }

    if !file.rows.is_empty() && file.dimensions != dimensions {
        return Err(Error::corruption(
            INDEX_NAME,
            format!(
                "stored vectors have {} dimensions but the encoder produces {}",
                file.dimensions, dimensions
            ),
        ));
    }

    if let Some(pos) = file.rows.iter().position(|r| r.len() != file.dimensions) {
        return Err(Error::corruption(
            INDEX_NAME,
            format!("vector {} does not have {} dimensions", pos, file.dimensions),
        ));
    }

    Ok(meta
        .into_iter()
        .zip(file.rows)
        .map(|(meta, vector)| SummaryRecord { meta, vector })
        .collect())
}

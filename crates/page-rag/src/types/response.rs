//! Response types for indexing and retrieval

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::page::PageRef;
use super::query::{IndexTarget, RetrievalStrategy};

/// A retrieved page image with the score that ranked it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageHit {
    /// Image path resolved through the image store
    pub path: PathBuf,
    pub document_id: String,
    pub page_number: u32,
    /// Similarity on the producing strategy's own scale
    pub score: f32,
    /// Strategy that produced this hit
    pub strategy: RetrievalStrategy,
}

impl PageHit {
    pub fn page_ref(&self) -> PageRef {
        PageRef::new(self.document_id.clone(), self.page_number)
    }
}

/// Outcome of indexing one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub document_id: String,
    /// Rasterized page images in page order
    pub pages: Vec<PathBuf>,
    pub target: IndexTarget,
    /// Pages appended to the summary index
    pub summary_pages_added: usize,
    /// Pages appended to the visual index
    pub visual_pages_added: usize,
    pub processing_time_ms: u64,
}

/// Per-strategy presence of a document, for duplicate pre-checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub document_id: String,
    /// Page numbers present in the summary index
    pub summary_pages: Vec<u32>,
    /// Page numbers present in the visual index
    pub visual_pages: Vec<u32>,
    /// Rendered page images on disk, in page order
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

impl IndexStatus {
    /// Present under at least one strategy
    pub fn is_indexed(&self) -> bool {
        !self.summary_pages.is_empty() || !self.visual_pages.is_empty()
    }

    /// Both strategies hold exactly the same pages
    pub fn is_consistent(&self) -> bool {
        self.summary_pages == self.visual_pages
    }

    /// Pages indexed under the summary strategy but missing from the visual one
    pub fn missing_visual(&self) -> Vec<u32> {
        self.summary_pages
            .iter()
            .filter(|p| !self.visual_pages.contains(p))
            .copied()
            .collect()
    }

    /// Pages indexed under the visual strategy but missing from the summary one
    pub fn missing_summary(&self) -> Vec<u32> {
        self.visual_pages
            .iter()
            .filter(|p| !self.summary_pages.contains(p))
            .copied()
            .collect()
    }
}

/// Index size statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub summary_entries: usize,
    pub visual_entries: usize,
    pub visual_chunks: usize,
    pub documents: usize,
}

/// Retrieval response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub strategy: RetrievalStrategy,
    pub hits: Vec<PageHit>,
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_status_detects_partial_document() {
        let status = IndexStatus {
            document_id: "report".to_string(),
            summary_pages: vec![1, 2, 3],
            visual_pages: vec![1, 2],
            images: Vec::new(),
        };

        assert!(status.is_indexed());
        assert!(!status.is_consistent());
        assert_eq!(status.missing_visual(), vec![3]);
        assert!(status.missing_summary().is_empty());
    }

    #[test]
    fn test_unindexed_status() {
        let status = IndexStatus {
            document_id: "new".to_string(),
            summary_pages: vec![],
            visual_pages: vec![],
            images: vec![],
        };
        assert!(!status.is_indexed());
        assert!(status.is_consistent());
    }
}

//! Document, page and index entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Suffix separating the document id from the page number in image filenames
const PAGE_MARKER: &str = "_page";

/// Extension of rasterized page images
pub const PAGE_EXTENSION: &str = "jpg";

/// Document id of a source file: its filename stem
pub fn document_id_from_path(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::rasterization(
                path.display().to_string(),
                "document path has no usable file name",
            )
        })
}

/// One page of a document, identified by `(document_id, page_number)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageRef {
    pub document_id: String,
    /// 1-based page number
    pub page_number: u32,
}

impl PageRef {
    pub fn new(document_id: impl Into<String>, page_number: u32) -> Self {
        Self {
            document_id: document_id.into(),
            page_number,
        }
    }

    /// Image filename of this page: `{document_id}_page{n}.jpg`
    pub fn image_filename(&self) -> String {
        format!(
            "{}{}{}.{}",
            self.document_id, PAGE_MARKER, self.page_number, PAGE_EXTENSION
        )
    }

    /// Parse a page reference back out of an image path
    pub fn from_image_path(path: &Path) -> Result<Self> {
        let invalid = || {
            Error::InvalidRequest(format!(
                "'{}' is not a page image named {{document}}{}{{n}}.{}",
                path.display(),
                PAGE_MARKER,
                PAGE_EXTENSION
            ))
        };

        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
        let (document_id, page) = stem.rsplit_once(PAGE_MARKER).ok_or_else(invalid)?;
        let page_number: u32 = page.parse().map_err(|_| invalid())?;

        if document_id.is_empty() || page_number == 0 {
            return Err(invalid());
        }

        Ok(Self::new(document_id, page_number))
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.page_number)
    }
}

/// Metadata log entry shared by both indices
///
/// The entry's position in its log is the key that joins it to the vector
/// row (summary index) or embedding set (visual index) at the same position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub document_id: String,
    pub image_filename: String,
    pub page_number: u32,
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Build an entry for a page image path
    pub fn for_image(image_path: &Path) -> Result<Self> {
        let page = PageRef::from_image_path(image_path)?;
        let image_filename = image_path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| page.image_filename());

        Ok(Self {
            document_id: page.document_id,
            image_filename,
            page_number: page.page_number,
            indexed_at: Utc::now(),
        })
    }

    /// The page this entry points at
    pub fn page_ref(&self) -> PageRef {
        PageRef::new(self.document_id.clone(), self.page_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_image_filename_round_trip() {
        let page = PageRef::new("annual_report", 12);
        assert_eq!(page.image_filename(), "annual_report_page12.jpg");

        let path = Path::new("/data/images/annual_report").join(page.image_filename());
        assert_eq!(PageRef::from_image_path(&path).unwrap(), page);
    }

    #[test]
    fn test_document_id_with_page_marker_inside() {
        // rsplit keeps everything before the last marker as the id
        let parsed = PageRef::from_image_path(Path::new("x/my_pages_page3.jpg")).unwrap();
        assert_eq!(parsed.document_id, "my_pages");
        assert_eq!(parsed.page_number, 3);
    }

    #[test]
    fn test_rejects_non_page_images() {
        assert!(PageRef::from_image_path(Path::new("cover.jpg")).is_err());
        assert!(PageRef::from_image_path(Path::new("doc_page0.jpg")).is_err());
        assert!(PageRef::from_image_path(Path::new("doc_pageX.jpg")).is_err());
    }

    #[test]
    fn test_document_id_from_path() {
        assert_eq!(document_id_from_path(Path::new("/uploads/report.pdf")).unwrap(), "report");
        assert!(matches!(
            document_id_from_path(Path::new("/")),
            Err(Error::Rasterization { .. })
        ));
    }

    #[test]
    fn test_index_entry_for_image() {
        let entry = IndexEntry::for_image(Path::new("/img/report/report_page2.jpg")).unwrap();
        assert_eq!(entry.document_id, "report");
        assert_eq!(entry.image_filename, "report_page2.jpg");
        assert_eq!(entry.page_ref(), PageRef::new("report", 2));
    }
}

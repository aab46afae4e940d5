//! Page image layout: `{root}/{document_id}/{document_id}_page{n}.jpg`

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{IndexEntry, PageRef};

/// Maps document ids to their ordered page image files
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Open (and create) an image store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding one document's pages
    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }

    /// Path of a page image
    pub fn page_path(&self, page: &PageRef) -> PathBuf {
        self.document_dir(&page.document_id).join(page.image_filename())
    }

    /// Resolve an index entry to its image path
    pub fn resolve(&self, entry: &IndexEntry) -> PathBuf {
        self.document_dir(&entry.document_id).join(&entry.image_filename)
    }

    /// Move a rendered page into the layout, replacing any previous render
    pub fn store_page(&self, page: &PageRef, rendered: &Path) -> Result<PathBuf> {
        let target = self.page_path(page);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // rename fails across filesystems (temp dir on tmpfs), fall back to copy
        if std::fs::rename(rendered, &target).is_err() {
            std::fs::copy(rendered, &target)?;
            std::fs::remove_file(rendered).ok();
        }

        Ok(target)
    }

    /// Page images of a document in ascending page order
    pub fn pages(&self, document_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.document_dir(document_id);
        if !dir.is_dir() {
            return Err(Error::InvalidRequest(format!(
                "No page images for document '{}'",
                document_id
            )));
        }

        let mut pages: Vec<(u32, PathBuf)> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let page = PageRef::from_image_path(e.path()).ok()?;
                (page.document_id == document_id).then(|| (page.page_number, e.into_path()))
            })
            .collect();

        pages.sort_by_key(|(n, _)| *n);
        Ok(pages.into_iter().map(|(_, p)| p).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_layout() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let path = store.page_path(&PageRef::new("report", 2));
        assert_eq!(path, dir.path().join("report").join("report_page2.jpg"));
    }

    #[test]
    fn test_pages_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let scratch = TempDir::new().unwrap();

        for n in [10u32, 2, 1] {
            let rendered = scratch.path().join(format!("render-{}.jpg", n));
            std::fs::write(&rendered, b"jpeg").unwrap();
            store.store_page(&PageRef::new("deck", n), &rendered).unwrap();
        }
        // Non-page files are ignored
        std::fs::write(store.document_dir("deck").join("notes.txt"), b"x").unwrap();

        let pages = store.pages("deck").unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["deck_page1.jpg", "deck_page2.jpg", "deck_page10.jpg"]);
    }

    #[test]
    fn test_unknown_document() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        assert!(store.pages("missing").is_err());
    }
}

//! PDF to page-image rasterization

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::config::RasterizerConfig;
use crate::error::{Error, Result};
use crate::storage::ImageStore;
use crate::types::{document_id_from_path, PageRef};

/// Turns a document into page images laid out in the image store
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page; paths come back in ascending page order
    ///
    /// Fails with `Error::Rasterization` on unreadable or corrupt input.
    async fn rasterize(&self, document_path: &Path) -> Result<Vec<PathBuf>>;

    /// Whether the backing tool can run at all
    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Rasterizer backed by poppler's `pdftoppm`
pub struct PdftoppmRasterizer {
    config: RasterizerConfig,
    images: ImageStore,
}

impl PdftoppmRasterizer {
    pub fn new(config: RasterizerConfig, images: ImageStore) -> Self {
        Self { config, images }
    }
}

/// Page count of a well-formed PDF
fn pdf_page_count(document_path: &Path) -> Result<usize> {
    let name = document_path.display().to_string();
    let doc = lopdf::Document::load(document_path)
        .map_err(|e| Error::rasterization(&name, format!("not a readable PDF: {}", e)))?;

    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(Error::rasterization(name, "PDF has no pages"));
    }
    Ok(pages)
}

/// Page number from pdftoppm's `{prefix}-{n}.jpg` output (n may be zero-padded)
fn rendered_page_number(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .rsplit_once('-')?
        .1
        .parse()
        .ok()
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, document_path: &Path) -> Result<Vec<PathBuf>> {
        let name = document_path.display().to_string();
        let document_id = document_id_from_path(document_path)?;

        let path = document_path.to_path_buf();
        let expected = tokio::task::spawn_blocking(move || pdf_page_count(&path))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        let scratch = tempfile::tempdir()?;
        let prefix = scratch.path().join("page");

        tracing::info!(
            "Rasterizing {} ({} pages at {} dpi)",
            name,
            expected,
            self.config.dpi
        );

        let run = Command::new(&self.config.pdftoppm_path)
            .arg("-jpeg")
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg(document_path)
            .arg(&prefix)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), run)
            .await
            .map_err(|_| {
                Error::rasterization(
                    &name,
                    format!("pdftoppm timed out after {}s", self.config.timeout_secs),
                )
            })?
            .map_err(|e| Error::rasterization(&name, format!("failed to run pdftoppm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::rasterization(
                &name,
                format!("pdftoppm exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let mut rendered: Vec<(u32, PathBuf)> = std::fs::read_dir(scratch.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| rendered_page_number(&p).map(|n| (n, p)))
            .collect();
        rendered.sort_by_key(|(n, _)| *n);

        if rendered.len() != expected {
            return Err(Error::rasterization(
                &name,
                format!("expected {} pages but pdftoppm produced {}", expected, rendered.len()),
            ));
        }

        let mut pages = Vec::with_capacity(rendered.len());
        for (n, path) in rendered {
            let page = PageRef::new(document_id.clone(), n);
            pages.push(self.images.store_page(&page, &path)?);
        }

        tracing::debug!("Stored {} page images for {}", pages.len(), document_id);

        Ok(pages)
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.config.pdftoppm_path)
            .arg("-v")
            .output()
            .await
            .is_ok()
    }

    fn name(&self) -> &str {
        "pdftoppm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rendered_page_number() {
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-1.jpg")), Some(1));
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-012.jpg")), Some(12));
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page.jpg")), None);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_rasterization_error() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("broken.pdf");
        std::fs::write(&bogus, b"this is not a pdf").unwrap();

        let rasterizer = PdftoppmRasterizer::new(
            RasterizerConfig::default(),
            ImageStore::new(dir.path().join("images")).unwrap(),
        );

        let result = rasterizer.rasterize(&bogus).await;
        assert!(matches!(result, Err(Error::Rasterization { .. })));
        // Nothing was laid out for the failed document
        assert!(!dir.path().join("images").join("broken").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_rasterization_error() {
        let dir = TempDir::new().unwrap();
        let rasterizer = PdftoppmRasterizer::new(
            RasterizerConfig::default(),
            ImageStore::new(dir.path().join("images")).unwrap(),
        );

        let result = rasterizer.rasterize(&dir.path().join("absent.pdf")).await;
        assert!(matches!(result, Err(Error::Rasterization { .. })));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let rasterizer = PdftoppmRasterizer::new(
            RasterizerConfig {
                pdftoppm_path: dir.path().join("no-such-pdftoppm"),
                ..RasterizerConfig::default()
            },
            ImageStore::new(dir.path().join("images")).unwrap(),
        );

        assert!(!rasterizer.is_available().await);
    }
}

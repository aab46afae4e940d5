//! Image transport helpers for multimodal requests

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

use crate::error::{Error, Result};

/// Read an image and encode it as a `data:image/jpeg;base64,...` URL
pub async fn encode_image_data_url(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        Error::InvalidRequest(format!("Cannot read image {}: {}", path.display(), e))
    })?;

    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_encodes_jpeg_data_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc_page1.jpg");
        std::fs::write(&path, b"abc").unwrap();

        let url = encode_image_data_url(&path).await.unwrap();
        assert_eq!(url, "data:image/jpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn test_missing_image() {
        let result = encode_image_data_url(Path::new("/nonexistent/page.jpg")).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}

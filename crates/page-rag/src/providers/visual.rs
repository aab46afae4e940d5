//! Late-interaction visual encoder (ColQwen2-style) served over HTTP
//!
//! The encoder maps a page image to one vector per image patch and a query
//! to one vector per query token. Both sides share the same width so
//! MaxSim can compare them directly.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::VisualEncoderConfig;
use crate::error::{Error, Result};
use crate::index::MultiVector;

use super::image::encode_image_data_url;
use super::retry::retry_request;

/// Trait for multi-vector image/query encoders
#[async_trait]
pub trait VisualEncoder: Send + Sync {
    /// Encode a page image into patch vectors
    async fn embed_image(&self, image_path: &Path) -> Result<MultiVector>;

    /// Encode a text query into token vectors
    async fn embed_query(&self, query: &str) -> Result<MultiVector>;

    /// Get encoder name
    fn name(&self) -> &str;
}

/// Client for an embedding server hosting the visual retrieval model
pub struct HttpVisualEncoder {
    client: Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct ImageEmbedRequest<'a> {
    model: &'a str,
    images: Vec<String>,
}

#[derive(Serialize)]
struct QueryEmbedRequest<'a> {
    model: &'a str,
    queries: Vec<&'a str>,
}

/// One `[n_vectors][dim]` matrix per input
#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<Vec<f32>>>,
}

impl HttpVisualEncoder {
    pub fn new(config: &VisualEncoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn post_embeddings<T: Serialize + Sync>(&self, route: &str, body: &T) -> Result<MultiVector> {
        let url = format!("{}/v1/embeddings/{}", self.base_url, route);

        let response = retry_request("Visual embedding", self.max_retries, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| Error::encoding(format!("Visual encoder request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(Error::encoding(format!(
                        "Visual encoder failed: HTTP {}",
                        response.status()
                    )));
                }

                response
                    .json::<EmbedResponse>()
                    .await
                    .map_err(|e| Error::encoding(format!("Failed to parse visual embeddings: {}", e)))
            }
        })
        .await?;

        let rows = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::encoding("Visual encoder returned no embeddings"))?;

        MultiVector::from_rows(rows)
    }
}

#[async_trait]
impl VisualEncoder for HttpVisualEncoder {
    async fn embed_image(&self, image_path: &Path) -> Result<MultiVector> {
        let image = encode_image_data_url(image_path).await?;
        let request = ImageEmbedRequest {
            model: &self.model,
            images: vec![image],
        };

        tracing::debug!("Encoding page image {}", image_path.display());
        self.post_embeddings("images", &request).await
    }

    async fn embed_query(&self, query: &str) -> Result<MultiVector> {
        let request = QueryEmbedRequest {
            model: &self.model,
            queries: vec![query],
        };
        self.post_embeddings("queries", &request).await
    }

    fn name(&self) -> &str {
        "colqwen"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"embeddings": [[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(raw).unwrap();
        let mv = MultiVector::from_rows(parsed.embeddings.into_iter().next().unwrap()).unwrap();
        assert_eq!(mv.len(), 3);
        assert_eq!(mv.dim(), 2);
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryEmbedRequest {
            model: "vidore/colqwen2-v1.0",
            queries: vec!["revenue"],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["queries"][0], "revenue");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_encoding_error() {
        let config = VisualEncoderConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..Default::default()
        };
        let encoder = HttpVisualEncoder::new(&config).unwrap();
        assert_eq!(encoder.max_retries, 0);
        let result = encoder.embed_query("anything").await;
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}

//! Configuration for the retrieval pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "PAGE_RAG_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// On-disk layout
    pub storage: StorageConfig,
    /// PDF rasterization
    pub rasterizer: RasterizerConfig,
    /// Vision chat model (answers and page summaries)
    pub llm: LlmConfig,
    /// Text encoder for the summary index
    pub embeddings: EmbeddingConfig,
    /// Visual multi-vector encoder service
    pub visual_encoder: VisualEncoderConfig,
    /// Visual index persistence
    pub visual_index: VisualIndexConfig,
    /// Query-time behaviour
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `PAGE_RAG_CONFIG`, or defaults when unset
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    /// Parse a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            if !model.trim().is_empty() {
                self.llm.chat_model = model;
            }
        }
        if let Some(dir) = std::env::var_os("PAGE_RAG_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings that would make the indices unusable
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.visual_index.chunk_size == 0 {
            return Err(Error::Config("visual_index.chunk_size must be > 0".to_string()));
        }
        if self.retrieval.default_top_k == 0 {
            return Err(Error::Config("retrieval.default_top_k must be > 0".to_string()));
        }
        if self.retrieval.fusion_depth == 0 {
            return Err(Error::Config("retrieval.fusion_depth must be > 0".to_string()));
        }
        if self.rasterizer.dpi == 0 {
            return Err(Error::Config("rasterizer.dpi must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for images and both indices
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Page images: `{data_dir}/images/{doc}/{doc}_page{n}.jpg`
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Summary index directory
    pub fn summary_index_dir(&self) -> PathBuf {
        self.data_dir.join("summary_index")
    }

    /// Visual index directory
    pub fn visual_index_dir(&self) -> PathBuf {
        self.data_dir.join("visual_index")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("page-rag");

        Self { data_dir }
    }
}

/// PDF rasterization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizerConfig {
    /// pdftoppm binary (poppler-utils)
    pub pdftoppm_path: PathBuf,
    /// Render resolution
    pub dpi: u32,
    /// Timeout for one document in seconds
    pub timeout_secs: u64,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            dpi: 100,
            timeout_secs: 300,
        }
    }
}

/// Vision chat model configuration (Mistral chat-completions API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// Bearer token; usually supplied via `MISTRAL_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model answering questions over retrieved pages
    pub chat_model: String,
    /// Model describing page images for the summary index
    pub summary_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens in a completion
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai/v1".to_string(),
            api_key: None,
            chat_model: "pixtral-12b-2409".to_string(),
            summary_model: "pixtral-12b-2409".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Text encoder backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX Runtime session
    #[default]
    Onnx,
    /// Ollama `/api/embeddings`
    Ollama,
}

/// Text encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// HuggingFace repository of the model (default: BAAI/bge-m3)
    pub model: String,
    /// Embedding dimensions (1024 for bge-m3)
    pub dimensions: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Maximum sequence length
    pub max_length: usize,
    /// Cache directory for model files
    pub cache_dir: PathBuf,
    /// Ollama base URL (ollama backend)
    pub ollama_url: String,
    /// Ollama model name (ollama backend)
    pub ollama_model: String,
    /// Request timeout in seconds (ollama backend)
    pub timeout_secs: u64,
    /// Retries for transient request failures (ollama backend)
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "BAAI/bge-m3".to_string(),
            dimensions: 1024,
            batch_size: 16,
            max_length: 512,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("page-rag")
                .join("models"),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "bge-m3".to_string(),
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Visual multi-vector encoder service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualEncoderConfig {
    /// Base URL of the embedding service
    pub base_url: String,
    /// Model served for both images and queries
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient request failures
    pub max_retries: u32,
}

impl Default for VisualEncoderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            model: "vidore/colqwen2-v1.0".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Visual index persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualIndexConfig {
    /// Embedding sets per chunk file
    pub chunk_size: usize,
}

impl Default for VisualIndexConfig {
    fn default() -> Self {
        Self { chunk_size: 500 }
    }
}

/// Query-time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not pass `top_k`
    pub default_top_k: usize,
    /// Top results taken from each strategy before the fusion union
    pub fusion_depth: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 2,
            fusion_depth: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.rasterizer.dpi, 100);
        assert_eq!(config.embeddings.dimensions, 1024);
        assert_eq!(config.retrieval.default_top_k, 2);
        assert_eq!(config.retrieval.fusion_depth, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml(
            r#"
            [storage]
            data_dir = "/srv/page-rag"

            [visual_index]
            chunk_size = 64

            [embeddings]
            backend = "ollama"

            [visual_encoder]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/page-rag"));
        assert_eq!(
            config.storage.images_dir(),
            PathBuf::from("/srv/page-rag/images")
        );
        assert_eq!(config.visual_index.chunk_size, 64);
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Ollama);
        assert_eq!(config.embeddings.model, "BAAI/bge-m3");
        assert_eq!(config.embeddings.max_retries, 2);
        assert_eq!(config.visual_encoder.max_retries, 5);
        assert_eq!(config.visual_encoder.timeout_secs, 120);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = RagConfig::default();
        config.visual_index.chunk_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            RagConfig::from_toml("[server]\nport = \"eighty\""),
            Err(Error::Config(_))
        ));
    }
}

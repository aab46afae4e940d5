//! ONNX-based text encoder
//!
//! Runs a BGE-family encoder (bge-m3 by default) locally. Sentence
//! embeddings are the L2-normalized `[CLS]` hidden state, so cosine and
//! inner-product similarity coincide.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::embedding::TextEncoder;

/// ONNX-based text encoder
pub struct OnnxTextEncoder {
    inner: Arc<OnnxSession>,
}

struct OnnxSession {
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Whether the graph declares a `token_type_ids` input (BERT does, XLM-R does not)
    uses_token_type_ids: bool,
    dimensions: usize,
    max_length: usize,
    batch_size: usize,
}

impl OnnxTextEncoder {
    /// Load the model, downloading it into the cache directory on first use
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX text encoder with model: {}", config.model);

        let model_dir = config.cache_dir.join(config.model.replace('/', "--"));
        std::fs::create_dir_all(&model_dir).map_err(|e| {
            Error::Config(format!("Failed to create cache directory: {}", e))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            download_file(&hf_url(&config.model, "onnx/model.onnx"), &model_path, true).await?;
            // Large models keep weights in an external data file next to the graph
            download_file(
                &hf_url(&config.model, "onnx/model.onnx_data"),
                &model_dir.join("model.onnx_data"),
                false,
            )
            .await?;
        }

        if !tokenizer_path.exists() {
            download_file(&hf_url(&config.model, "tokenizer.json"), &tokenizer_path, true).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::Encoding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::Encoding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::Encoding(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::Encoding(format!("Failed to load model: {}", e)))?;

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Encoding(format!("Failed to load tokenizer: {}", e)))?;

        tracing::info!("ONNX text encoder initialized successfully");

        Ok(Self {
            inner: Arc::new(OnnxSession {
                session: Mutex::new(session),
                tokenizer,
                uses_token_type_ids,
                dimensions: config.dimensions,
                max_length: config.max_length,
                batch_size: config.batch_size.max(1),
            }),
        })
    }
}

#[async_trait]
impl TextEncoder for OnnxTextEncoder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Encoding("Empty embedding result".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Inference is CPU-bound; keep it off the async workers
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut all_embeddings = Vec::with_capacity(texts.len());
            for batch in texts.chunks(inner.batch_size) {
                let refs: Vec<&str> = batch.iter().map(|s| s.as_str()).collect();
                all_embeddings.extend(inner.embed_batch_internal(&refs)?);
            }
            Ok(all_embeddings)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

impl OnnxSession {
    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Encoding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            input_ids.into_boxed_slice(),
        ))
        .map_err(|e| Error::Encoding(format!("Input tensor creation failed: {}", e)))?;

        let attention_mask_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            attention_mask.into_boxed_slice(),
        ))
        .map_err(|e| Error::Encoding(format!("Attention mask tensor creation failed: {}", e)))?;

        let mut inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
        ];

        if self.uses_token_type_ids {
            let token_type_ids_tensor = Tensor::from_array((
                vec![batch_size, max_len],
                token_type_ids.into_boxed_slice(),
            ))
            .map_err(|e| Error::Encoding(format!("Token type tensor creation failed: {}", e)))?;
            inputs.push(("token_type_ids", token_type_ids_tensor.into_dyn()));
        }

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::Encoding(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::Encoding("No output tensor".to_string()))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Encoding(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let seq_len = dims.get(1).copied().unwrap_or(max_len);
        let hidden_size = dims.get(2).copied().unwrap_or(self.dimensions);

        if hidden_size != self.dimensions {
            return Err(Error::Encoding(format!(
                "Model hidden size {} does not match configured dimensions {}",
                hidden_size, self.dimensions
            )));
        }

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            // [CLS] token at position 0
            let start = i * seq_len * hidden_size;
            let cls = tensor_data
                .get(start..start + hidden_size)
                .ok_or_else(|| Error::Encoding("Output tensor shorter than expected".to_string()))?;
            embeddings.push(l2_normalize(cls.to_vec()));
        }

        Ok(embeddings)
    }
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut v {
            *val /= norm;
        }
    }
    v
}

fn hf_url(repo: &str, file: &str) -> String {
    format!("https://huggingface.co/{}/resolve/main/{}", repo, file)
}

/// Download a model file; optional files are skipped on 404
async fn download_file(url: &str, path: &Path, required: bool) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::Encoding(format!("Failed to download {}: {}", url, e)))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND && !required {
        tracing::debug!("Optional model file not present: {}", url);
        return Ok(());
    }

    if !response.status().is_success() {
        return Err(Error::Encoding(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Encoding(format!("Failed to read {}: {}", url, e)))?;

    crate::storage::write_atomic(path, &bytes)?;

    tracing::info!("Downloaded {} ({} bytes)", path.display(), bytes.len());

    Ok(())
}

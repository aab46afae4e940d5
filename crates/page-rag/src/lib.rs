//! page-rag: Multimodal RAG over PDF page images
//!
//! Documents are rasterized into page images and indexed under two
//! retrieval strategies:
//!
//! - **Summary embedding**: a vision model describes each page in text and
//!   the description is embedded with a dense text encoder (bge-m3).
//! - **Visual multi-vector**: each page image is embedded directly into
//!   patch vectors (ColQwen2) and scored against query token vectors with
//!   MaxSim.
//!
//! [`retrieval::RetrievalPipeline`] keeps both indices in step, queries one
//! or both, and fuses the results. [`generation::AnswerGenerator`] hands the
//! retrieved pages to a vision chat model.

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use retrieval::RetrievalPipeline;
pub use types::{PageHit, RetrievalStrategy};

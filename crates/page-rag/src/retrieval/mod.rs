//! Retrieval orchestration over the summary and visual indices

pub mod fusion;
mod pipeline;

pub use pipeline::{PipelineComponents, RetrievalPipeline};

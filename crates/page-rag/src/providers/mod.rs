//! Provider abstractions for the external models the pipeline consumes
//!
//! Every model sits behind a trait so the indices and the pipeline take
//! their collaborators by constructor injection and tests can substitute
//! fakes.

pub mod embedding;
pub mod image;
pub mod llm;
pub mod mistral;
pub mod ollama;
pub mod onnx;
pub mod retry;
pub mod summarizer;
pub mod visual;

pub use embedding::TextEncoder;
pub use llm::ChatProvider;
pub use mistral::MistralClient;
pub use ollama::OllamaEmbedder;
pub use onnx::OnnxTextEncoder;
pub use summarizer::Summarizer;
pub use visual::{HttpVisualEncoder, VisualEncoder};

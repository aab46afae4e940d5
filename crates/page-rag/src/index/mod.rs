//! The two page indices
//!
//! - [`SummaryIndex`]: dense embeddings of generated page summaries
//! - [`VisualIndex`]: patch-level multi-vector embeddings of page images

pub mod multivector;
pub mod similarity;
pub mod summary;
pub mod visual;

pub use multivector::MultiVector;
pub use summary::SummaryIndex;
pub use visual::VisualIndex;

//! Document ingestion: turning source documents into page images

mod rasterizer;

pub use rasterizer::{PdftoppmRasterizer, Rasterizer};

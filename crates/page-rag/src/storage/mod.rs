//! On-disk storage: page image layout and atomic file persistence

mod image_store;
mod persist;

pub use image_store::ImageStore;
pub use persist::{read_json_or_default, write_atomic, write_json_atomic};

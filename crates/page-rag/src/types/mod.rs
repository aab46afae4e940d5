//! Core types for the retrieval pipeline

pub mod chat;
pub mod page;
pub mod query;
pub mod response;

pub use chat::{ChatMessage, ChatRole, ContentPart};
pub use page::{document_id_from_path, IndexEntry, PageRef};
pub use query::{ChatRequest, IndexRequest, IndexTarget, RetrievalStrategy, RetrieveRequest};
pub use response::{IndexStats, IndexStatus, IndexedDocument, PageHit, RetrieveResponse};

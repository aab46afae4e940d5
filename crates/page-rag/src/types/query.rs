//! Request types for indexing and retrieval

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::chat::ChatMessage;

/// Which retrieval strategy answers a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Dense embedding over generated page summaries only
    SummaryEmbedding,
    /// Visual multi-vector embedding over raw page images only
    VisualMultiVector,
    /// Union of the top results of both strategies
    #[default]
    Fusion,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SummaryEmbedding => "summary_embedding",
            Self::VisualMultiVector => "visual_multi_vector",
            Self::Fusion => "fusion",
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "summary_embedding" | "summary" | "summaryemb" => Ok(Self::SummaryEmbedding),
            "visual_multi_vector" | "visual" | "colqwen" => Ok(Self::VisualMultiVector),
            "fusion" | "intersection" => Ok(Self::Fusion),
            other => Err(format!(
                "unknown strategy '{}' (expected summary_embedding, visual_multi_vector or fusion)",
                other
            )),
        }
    }
}

/// Which indices an indexing call writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexTarget {
    /// Both indices, summary first
    #[default]
    All,
    /// Summary index only (re-run after a failed summary pass)
    SummaryOnly,
    /// Visual index only (re-run after a partial index error)
    VisualOnly,
}

impl IndexTarget {
    pub fn includes_summary(&self) -> bool {
        matches!(self, Self::All | Self::SummaryOnly)
    }

    pub fn includes_visual(&self) -> bool {
        matches!(self, Self::All | Self::VisualOnly)
    }
}

/// Retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    /// Query text
    pub query: String,
    /// Strategy (default: fusion)
    #[serde(default)]
    pub strategy: RetrievalStrategy,
    /// Results per strategy (default from config)
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Indexing request for a document already readable by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequest {
    pub document_path: PathBuf,
    #[serde(default)]
    pub target: IndexTarget,
}

/// Conversational question with retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Prior turns, oldest first (system prompt excluded)
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// New user question
    pub question: String,
    #[serde(default)]
    pub strategy: RetrievalStrategy,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "summary_embedding".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::SummaryEmbedding
        );
        assert_eq!(
            "Visual-Multi-Vector".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::VisualMultiVector
        );
        assert_eq!(
            "intersection".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::Fusion
        );
        assert!("bm25".parse::<RetrievalStrategy>().is_err());
    }

    #[test]
    fn test_retrieve_request_defaults() {
        let request: RetrieveRequest = serde_json::from_str(r#"{"query": "revenue"}"#).unwrap();
        assert_eq!(request.strategy, RetrievalStrategy::Fusion);
        assert!(request.top_k.is_none());

        let request: RetrieveRequest =
            serde_json::from_str(r#"{"query": "q", "strategy": "visual_multi_vector", "top_k": 5}"#)
                .unwrap();
        assert_eq!(request.strategy, RetrievalStrategy::VisualMultiVector);
        assert_eq!(request.top_k, Some(5));
    }

    #[test]
    fn test_index_target_scope() {
        assert!(IndexTarget::All.includes_summary() && IndexTarget::All.includes_visual());
        assert!(!IndexTarget::VisualOnly.includes_summary());
        assert!(!IndexTarget::SummaryOnly.includes_visual());
    }
}

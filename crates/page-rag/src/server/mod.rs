//! HTTP server for the retrieval pipeline

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server with production collaborators
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            // Applied bottom to top
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting page-rag server on http://{}", addr);
        tracing::info!("API info: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Ready once documents can be rasterized
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.pipeline().is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{PdftoppmRasterizer, Rasterizer};
    use crate::retrieval::{PipelineComponents, RetrievalPipeline};
    use crate::storage::ImageStore;
    use crate::testing::{
        test_config, write_document, FakeRasterizer, FakeSummarizer, RecordingChat,
        VocabTextEncoder, VocabVisualEncoder, TEST_DIMENSIONS,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn server(dir: &TempDir) -> RagServer {
        let config = test_config(dir.path());
        let images = ImageStore::new(config.storage.images_dir()).unwrap();
        server_with(config, Arc::new(FakeRasterizer::new(images)))
    }

    fn server_with(config: RagConfig, rasterizer: Arc<dyn Rasterizer>) -> RagServer {
        let pipeline = RetrievalPipeline::new(
            &config,
            PipelineComponents {
                rasterizer,
                summarizer: Arc::new(FakeSummarizer),
                text_encoder: Arc::new(VocabTextEncoder::new(TEST_DIMENSIONS)),
                visual_encoder: Arc::new(VocabVisualEncoder::new(TEST_DIMENSIONS)),
            },
        )
        .unwrap();

        RagServer::with_state(AppState::from_parts(
            config,
            Arc::new(pipeline),
            Arc::new(RecordingChat::default()),
        ))
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let dir = TempDir::new().unwrap();
        let router = server(&dir).build_router();

        let (status, _) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_ready_without_rasterizer() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.rasterizer.pdftoppm_path = dir.path().join("no-such-pdftoppm");
        let images = ImageStore::new(config.storage.images_dir()).unwrap();
        let rasterizer = Arc::new(PdftoppmRasterizer::new(config.rasterizer.clone(), images));
        let router = server_with(config, rasterizer).build_router();

        let (status, _) = send(&router, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_then_retrieve() {
        let dir = TempDir::new().unwrap();
        let router = server(&dir).build_router();
        let doc = write_document(
            dir.path(),
            "report.pdf",
            &["revenue growth in the third quarter", "employee headcount"],
        );

        let (status, indexed) = send(
            &router,
            Method::POST,
            "/api/index",
            Some(json!({ "document_path": doc })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(indexed["document_id"], "report");
        assert_eq!(indexed["summary_pages_added"], 2);

        let (status, check) = send(&router, Method::GET, "/api/index/report", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check["summary_pages"], json!([1, 2]));
        assert_eq!(check["visual_pages"], json!([1, 2]));
        let images = check["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[1].as_str().unwrap().ends_with("report_page2.jpg"));

        let (status, retrieved) = send(
            &router,
            Method::POST,
            "/api/retrieve",
            Some(json!({ "query": "revenue growth", "strategy": "summary_embedding", "top_k": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retrieved["hits"].as_array().unwrap().len(), 1);
        assert_eq!(retrieved["hits"][0]["page_number"], 1);

        let (_, stats) = send(&router, Method::GET, "/api/stats", None).await;
        assert_eq!(stats["documents"], 1);
    }

    #[tokio::test]
    async fn test_chat_returns_answer_and_history() {
        let dir = TempDir::new().unwrap();
        let router = server(&dir).build_router();

        let (status, answer) = send(
            &router,
            Method::POST,
            "/api/chat",
            Some(json!({ "question": "what changed?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answer["history"].as_array().unwrap().len(), 2);
        assert!(answer["sources"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_errors_map_to_status() {
        let dir = TempDir::new().unwrap();
        let router = server(&dir).build_router();

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/index",
            Some(json!({ "document_path": dir.path().join("missing.pdf") })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");

        let (status, _) = send(
            &router,
            Method::POST,
            "/api/retrieve",
            Some(json!({ "query": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

//! page-rag server binary
//!
//! Run with: cargo run -p page-rag --bin page-rag-server
//! Config file: PAGE_RAG_CONFIG=/path/to/page-rag.toml

use page_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data dir: {}", config.storage.data_dir.display());
    tracing::info!(
        "  - Text encoder: {} ({:?}, {} dims)",
        config.embeddings.model,
        config.embeddings.backend,
        config.embeddings.dimensions
    );
    tracing::info!(
        "  - Visual encoder: {} at {}",
        config.visual_encoder.model,
        config.visual_encoder.base_url
    );
    tracing::info!("  - Chat model: {}", config.llm.chat_model);
    tracing::info!("  - Fusion depth: {}", config.retrieval.fusion_depth);

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/index     - Index a PDF by path");
    println!("  POST /api/retrieve  - Retrieve page images");
    println!("  POST /api/chat      - Ask questions");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

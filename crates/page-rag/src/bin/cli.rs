//! page-rag command line interface
//!
//! Run with: cargo run -p page-rag --features cli --bin page-rag -- <command>

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use page_rag::{
    config::RagConfig,
    generation::AnswerGenerator,
    providers::MistralClient,
    retrieval::RetrievalPipeline,
    types::{ChatRequest, IndexTarget, PageRef, RetrievalStrategy},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Index PDFs and query them by page image
#[derive(Parser, Debug)]
#[command(name = "page-rag")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multimodal RAG over PDF page images")]
struct Args {
    /// TOML config file (defaults to $PAGE_RAG_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterize PDFs and add their pages to the indices
    Index {
        /// PDF files
        #[arg(required = true)]
        documents: Vec<PathBuf>,

        /// Only write the summary index
        #[arg(long, conflicts_with = "visual_only")]
        summary_only: bool,

        /// Only write the visual index
        #[arg(long)]
        visual_only: bool,

        /// Index documents that already have pages in an index
        #[arg(long)]
        force: bool,
    },

    /// Print the page images that best match a query
    Retrieve {
        query: String,

        /// summary_embedding, visual_multi_vector or fusion
        #[arg(short, long, default_value = "fusion")]
        strategy: RetrievalStrategy,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Answer a question over the retrieved pages
    Ask {
        question: String,

        #[arg(short, long, default_value = "fusion")]
        strategy: RetrievalStrategy,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show index sizes
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "page_rag=warn",
        1 => "page_rag=info",
        _ => "page_rag=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => RagConfig::load(Some(path))?,
        None => RagConfig::from_env()?,
    };

    let pipeline = Arc::new(RetrievalPipeline::from_config(&config).await?);

    match args.command {
        Command::Index {
            documents,
            summary_only,
            visual_only,
            force,
        } => {
            let target = if summary_only {
                IndexTarget::SummaryOnly
            } else if visual_only {
                IndexTarget::VisualOnly
            } else {
                IndexTarget::All
            };

            for path in documents {
                let document_id = page_rag::types::document_id_from_path(&path)?;
                let status = pipeline.index_status(&document_id);
                if status.is_indexed() && !force {
                    println!(
                        "{}: already indexed (summary pages {:?}, visual pages {:?}); use --force to add again",
                        document_id, status.summary_pages, status.visual_pages
                    );
                    if !status.is_consistent() {
                        let missing_visual = status.missing_visual();
                        let missing_summary = status.missing_summary();
                        if !missing_visual.is_empty() {
                            println!(
                                "  pages {:?} are missing from the visual index; re-run with --visual-only --force",
                                missing_visual
                            );
                        }
                        if !missing_summary.is_empty() {
                            println!(
                                "  pages {:?} are missing from the summary index; re-run with --summary-only --force",
                                missing_summary
                            );
                        }
                    }
                    continue;
                }

                let indexed = pipeline.add_to_index_with(&path, target).await?;
                println!(
                    "{}: {} pages ({} summary, {} visual) in {}ms",
                    indexed.document_id,
                    indexed.pages.len(),
                    indexed.summary_pages_added,
                    indexed.visual_pages_added,
                    indexed.processing_time_ms
                );
            }
        }

        Command::Retrieve {
            query,
            strategy,
            top_k,
        } => {
            let top_k = top_k.unwrap_or(pipeline.default_top_k());
            let hits = pipeline.retrieve_hits(&query, strategy, top_k).await?;
            if hits.is_empty() {
                println!("No pages indexed yet");
            }
            for hit in hits {
                println!(
                    "{:>10.4}  {:<20}  {}",
                    hit.score,
                    hit.strategy,
                    hit.path.display()
                );
                if args.verbose > 0 {
                    let page = PageRef::new(hit.document_id, hit.page_number);
                    if let Some(summary) = pipeline.summary_of(&page) {
                        println!("            {}", summary.replace('\n', " "));
                    }
                }
            }
        }

        Command::Ask {
            question,
            strategy,
            top_k,
        } => {
            let chat = Arc::new(MistralClient::new(&config.llm)?);
            let generator = AnswerGenerator::new(Arc::clone(&pipeline), chat);
            let answer = generator
                .answer(&ChatRequest {
                    history: Vec::new(),
                    question,
                    strategy,
                    top_k,
                })
                .await?;

            println!("{}\n", answer.text);
            println!("Sources:");
            for hit in &answer.sources {
                println!("  {}", hit.path.display());
            }
        }

        Command::Stats => {
            let stats = pipeline.stats();
            println!("Documents:        {}", stats.documents);
            println!("Summary entries:  {}", stats.summary_entries);
            println!("Visual entries:   {}", stats.visual_entries);
            println!("Visual chunks:    {}", stats.visual_chunks);
        }
    }

    Ok(())
}

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aas_embedding_service::config::Config;
use aas_embedding_service::embeddings::create_embedder;
use aas_embedding_service::events::EventDispatcher;
use aas_embedding_service::extract::PdfConverter;
use aas_embedding_service::fetch::HttpFetcher;
use aas_embedding_service::index::lancedb::LanceDbIndex;
use aas_embedding_service::ingest::IngestPipeline;
use aas_embedding_service::metrics::{spawn_metrics_server, MetricsRegistry};
use aas_embedding_service::server::{serve, AppState};

fn wants_help(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-h" || a == "--help" || a == "help")
}

fn wants_version(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-V" || a == "--version" || a == "version")
}

fn print_help() {
    println!("aas-embedding-service");
    println!();
    println!("Keeps a vector-search index synchronized with PDF attachments in AAS submodels.");
    println!();
    println!("Usage:");
    println!("  aas-embedding-service");
    println!("  aas-embedding-service --help");
    println!("  aas-embedding-service --version");
    println!();
    println!("Common env (defaults shown):");
    println!("  EVENTS_ADDR=0.0.0.0:8000");
    println!("  SUBMODEL_REPO_URL=http://basyx-repo");
    println!("  VECTOR_DB_PATH=./data/vectors");
    println!("  COLLECTION_NAME=docs");
    println!("  EMBEDDINGS_BACKEND=fastembed|hash     (default: fastembed)");
    println!("  EMBEDDINGS_MODEL_REPO=org/repo        (default: BAAI/bge-base-en-v1.5)");
    println!("                                        (supported: BAAI/bge-base-en-v1.5, BAAI/bge-small-en-v1.5,");
    println!("                                         sentence-transformers/all-MiniLM-L6-v2)");
    println!("  EMBEDDINGS_MODEL_DIR=./data/embeddings-cache");
    println!("  EMBEDDINGS_DEVICE=cpu|metal           (default: cpu)");
    println!("  EMBEDDING_BATCH_SIZE=100");
    println!("  CHUNK_SIZE=800");
    println!("  CHUNK_OVERLAP=150");
    println!("  DOWNLOAD_TIMEOUT_S=30");
    println!("  DOWNLOAD_DIR=./pdfs");
    println!("  EVENT_WORKERS=4");
    println!("  METRICS_PORT=<port>                   (metrics disabled when unset)");
    println!();
    println!("Endpoints:");
    println!("  POST /events, GET /health, POST /search");
}

fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if wants_help(&args) {
        print_help();
        return Ok(());
    }
    if wants_version(&args) {
        print_version();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting aas-embedding-service"
    );

    if let Err(err) = run().await {
        error!(error = %err, "Server exited with error");
        return Err(err);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let embedder = create_embedder(
        config.embeddings_backend,
        config.embeddings_model_dir.as_deref(),
        config.embeddings_model_repo.as_deref(),
        config.embeddings_device,
        config.hash_embedding_dim,
    )?;
    info!(dim = embedder.dim(), "embedder initialized");

    let index = LanceDbIndex::connect(&config.vector_db_path, &config.collection_name).await?;
    let fetcher = HttpFetcher::new(config.download_timeout)?;
    let metrics = Arc::new(MetricsRegistry::new()?);

    let config = Arc::new(config);
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::clone(&config),
        Arc::new(index),
        embedder,
        Arc::new(fetcher),
        Arc::new(PdfConverter),
        Arc::clone(&metrics),
    ));

    let dispatcher = Arc::new(EventDispatcher::start(
        Arc::clone(&pipeline),
        config.event_workers,
    ));

    if let Some(port) = config.metrics_port {
        spawn_metrics_server(Arc::clone(&metrics), port).await?;
    }

    let state = AppState {
        pipeline,
        dispatcher,
    };
    serve(state, config.events_addr).await
}

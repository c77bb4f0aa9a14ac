//! ProtoLens Ingestion CLI
//!
//! Loads one protocol PDF into the configured collection:
//! 1. Extracts and segments the document
//! 2. Embeds every chunk
//! 3. Replaces the collection contents
//! 4. Prints the ingestion report as JSON

use clap::Parser;
use protolens_common::{
    config::AppConfig, embeddings::create_embedder, index::Collection, telemetry, VERSION,
};
use protolens_ingestion::{IngestionProcessor, LopdfExtractor, Segmenter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "protolens-ingest", version, about = "Ingest a clinical protocol PDF")]
struct Args {
    /// Path to the protocol PDF
    pdf: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    config.validate()?;

    telemetry::init_tracing(&config.observability);
    telemetry::init_metrics(&config.observability)?;

    info!("Starting ProtoLens Ingestion v{}", VERSION);

    let args = Args::parse();

    if config.index.backend == "memory" {
        tracing::warn!("index.backend is memory, ingested chunks are lost when this process exits");
    }

    let embedder = create_embedder(&config.embedding)?;
    let collection = Collection::open(&config.index, embedder.dimension()).await?;
    let processor = IngestionProcessor::new(
        Arc::new(LopdfExtractor),
        Segmenter::new(config.chunking)?,
        embedder,
        collection,
        config.embedding.batch_size,
    );

    let report = processor.ingest_file(&args.pdf).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

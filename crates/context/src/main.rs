//! ProtoLens CLI
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use protolens_common::config::{AppConfig, SummaryMode};
use protolens_common::models::ExtractedSection;
use protolens_common::{telemetry, VERSION};
use protolens_context::ProtocolAssistant;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "protolens",
    version,
    about = "Question answering and section extraction for clinical trial protocols"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a protocol PDF, replacing the collection contents
    Ingest {
        /// Path to the protocol PDF
        pdf: PathBuf,
    },
    /// Answer a question about the ingested protocol
    Ask {
        /// Ingest this PDF first
        #[arg(long)]
        pdf: Option<PathBuf>,
        question: String,
    },
    /// Extract the protocol sections for review
    Extract {
        /// Ingest this PDF first
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Approve every extracted section and print the summary too
        #[arg(long)]
        approve_all: bool,
        /// Generate the summary as prose
        #[arg(long)]
        prose: bool,
    },
    /// Summarize reviewed sections read from a JSON file
    Summarize {
        /// JSON array of extracted sections with `approved` set
        sections: PathBuf,
        /// Generate the summary as prose
        #[arg(long)]
        prose: bool,
    },
    /// Probe the generation model and report its status
    WarmUp,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn ingest_first(assistant: &ProtocolAssistant, pdf: Option<&Path>) -> anyhow::Result<()> {
    if let Some(pdf) = pdf {
        let report = assistant.ingest(pdf).await?;
        info!(
            source = %report.source,
            chunks = report.chunk_count,
            "Protocol ingested"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load()?;
    if let Command::Extract { prose: true, .. } | Command::Summarize { prose: true, .. } =
        &cli.command
    {
        config.extraction.summary_mode = SummaryMode::Prose;
    }
    config.validate()?;

    telemetry::init_tracing(&config.observability);
    telemetry::init_metrics(&config.observability)?;

    info!("Starting ProtoLens v{}", VERSION);

    if config.index.backend == "memory" {
        match &cli.command {
            Command::Ask { pdf: None, .. } | Command::Extract { pdf: None, .. } => {
                warn!("index.backend is memory and no --pdf was given, the collection is empty");
            }
            _ => {}
        }
    }

    let assistant = ProtocolAssistant::initialize(&config).await?;

    match cli.command {
        Command::Ingest { pdf } => {
            let report = assistant.ingest(&pdf).await?;
            print_json(&report)?;
        }
        Command::Ask { pdf, question } => {
            ingest_first(&assistant, pdf.as_deref()).await?;
            let answer = assistant.ask(&question).await;
            print_json(&answer)?;
        }
        Command::Extract {
            pdf, approve_all, ..
        } => {
            ingest_first(&assistant, pdf.as_deref()).await?;
            let mut sections = assistant.extract_all().await;

            if approve_all {
                for section in &mut sections {
                    section.approved = Some(true);
                }
                let summary = assistant.summarize(&sections).await?;
                print_json(&serde_json::json!({
                    "sections": sections,
                    "summary": summary,
                }))?;
            } else {
                print_json(&sections)?;
            }
        }
        Command::Summarize { sections, .. } => {
            let raw = tokio::fs::read_to_string(&sections).await?;
            let sections: Vec<ExtractedSection> = serde_json::from_str(&raw)?;
            let summary = assistant.summarize(&sections).await?;
            print_json(&summary)?;
        }
        Command::WarmUp => {
            print_json(assistant.warm_up_status())?;
        }
    }

    Ok(())
}

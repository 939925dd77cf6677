//! claimcheck - review healthcare bills and EOBs for billing problems.
//!
//! Usage:
//!   claimcheck analyze bill.jpg eob.pdf --network in_network --emergency
//!   claimcheck analyze letter.png --narrative "They denied it for no referral" --db

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use claimcheck::config::{self, PipelineConfig};
use claimcheck::db::{ExtractionStore, SqliteExtractionStore};
use claimcheck::models::enums::{FacilityType, NetworkStatus};
use claimcheck::models::{Benefits, CaseContext, InferredFlags};
use claimcheck::pipeline::{DocumentInput, ExtractionPipeline};

#[derive(Parser)]
#[command(name = "claimcheck", version, about = "Dual-vendor extraction and compliance review for medical bills")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every document and print the analysis report as JSON
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Images or PDFs; each file is one document
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// The patient's own account of what happened
    #[arg(long, default_value = "")]
    narrative: String,

    /// The visit was an emergency
    #[arg(long)]
    emergency: bool,

    /// in_network, out_of_network or unknown
    #[arg(long, value_parser = NetworkStatus::from_str)]
    network: Option<NetworkStatus>,

    #[arg(long, value_parser = FacilityType::from_str)]
    facility: Option<FacilityType>,

    /// Ancillary provider on the case (repeatable)
    #[arg(long = "ancillary")]
    ancillary: Vec<String>,

    /// The patient has a second health plan
    #[arg(long)]
    secondary_coverage: bool,

    /// Document type hint passed to the vendors (BILL, EOB, LETTER, ...)
    #[arg(long)]
    doc_type: Option<String>,

    #[arg(long)]
    case_id: Option<Uuid>,

    /// Persist results; without a path, uses the default database
    #[arg(long)]
    db: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    claimcheck::init_tracing();
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(args).await,
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let documents = args
        .files
        .iter()
        .map(|path| read_document(path, args.doc_type.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    let ctx = CaseContext::new(args.case_id.unwrap_or_else(Uuid::new_v4))
        .with_narrative(args.narrative)
        .with_benefits(Benefits {
            network_status: args.network,
            has_secondary_coverage: args.secondary_coverage,
            ..Default::default()
        })
        .with_flags(InferredFlags {
            emergency: args.emergency,
            facility_type: args.facility,
            ancillary_vendors: args.ancillary,
        });

    let store = match args.db {
        None => None,
        Some(path) => Some(open_store(path.unwrap_or_else(config::default_database_path))?),
    };

    let pipeline_config = PipelineConfig::from_env().context("Invalid vendor configuration")?;
    let pipeline = ExtractionPipeline::from_config(&pipeline_config)?;

    let report = pipeline
        .analyze_case(
            &documents,
            &ctx,
            store.as_ref().map(|s| s as &dyn ExtractionStore),
        )
        .await?;

    tracing::info!(
        case_id = %report.case_id,
        status = ?report.status(),
        detections = report.detections.len(),
        "Analysis finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_document(path: &Path, doc_type: Option<&str>) -> Result<DocumentInput> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let supported = mime.type_() == mime_guess::mime::IMAGE || mime.essence_str() == "application/pdf";
    if !supported {
        bail!("Unsupported file type {} for {}", mime.essence_str(), path.display());
    }

    let buffer = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let doc = DocumentInput::single(&name, buffer, mime.essence_str());
    Ok(match doc_type {
        Some(hint) => doc.with_doc_type_hint(hint),
        None => doc,
    })
}

fn open_store(path: PathBuf) -> Result<SqliteExtractionStore> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteExtractionStore::open(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

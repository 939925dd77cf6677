pub mod normalize;
pub mod orchestrator;
pub mod reconcile;
pub mod vendor;

pub use orchestrator::{
    AnalysisReport, DocumentInput, ExtractionPipeline, PageFailure, PageImage, PersistenceStatus,
    RunStatus,
};

use vendor::VendorError;

/// Errors that stop a whole analysis run. Per-page vendor failures and
/// persistence failures are reported in `AnalysisReport` instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No page of any document could be extracted: {}", describe_failures(.failures))]
    AllPagesFailed { failures: Vec<PageFailure> },

    #[error("Document has no pages: {0}")]
    EmptyDocument(String),

    #[error("No documents supplied")]
    NoDocuments,

    #[error("Vendor setup failed: {0}")]
    Vendor(#[from] VendorError),
}

fn describe_failures(failures: &[PageFailure]) -> String {
    failures
        .iter()
        .map(|f| {
            let causes: Vec<String> = f.errors.iter().map(|e| e.to_string()).collect();
            format!("page {} ({})", f.page, causes.join("; "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

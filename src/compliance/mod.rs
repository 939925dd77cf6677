pub mod citations;
pub mod codes;
pub mod detection;
pub mod engine;
pub mod messages;
pub mod types;

pub use citations::CitationCompiler;
pub use engine::ComplianceEngine;
pub use types::{
    ComplianceResult, ContextField, Detection, Detector, Evidence, LineRef, PolicyCitation,
    Severity,
};

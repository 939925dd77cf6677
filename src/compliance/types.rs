use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{Authority, DetectionCategory};
use crate::models::{CaseContext, NormalizedLineItem};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Fixed per detector. Encodes the regulatory weight of the category, not a
/// probability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::High => "high",
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyCitation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCitation {
    pub title: String,
    pub authority: Authority,
    pub citation: String,
}

impl PolicyCitation {
    pub fn new(title: &str, authority: Authority, citation: &str) -> Self {
        Self {
            title: title.to_string(),
            authority,
            citation: citation.to_string(),
        }
    }

    /// Identity used for deduplication.
    pub fn key(&self) -> (Authority, &str) {
        (self.authority, self.citation.as_str())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Pointer back to the line item a finding is based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRef {
    pub line_id: Uuid,
    pub artifact_id: Uuid,
    pub page: u32,
    pub row_index: usize,
    pub code: Option<String>,
}

impl From<&NormalizedLineItem> for LineRef {
    fn from(item: &NormalizedLineItem) -> Self {
        Self {
            line_id: item.line_id,
            artifact_id: item.artifact_id,
            page: item.page,
            row_index: item.row_index,
            code: item.code.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub lines: Vec<LineRef>,
    pub snippets: Vec<String>,
    pub pages: Vec<u32>,
}

impl Evidence {
    pub fn from_lines(items: &[&NormalizedLineItem]) -> Self {
        let mut pages: Vec<u32> = items.iter().map(|i| i.page).collect();
        pages.sort_unstable();
        pages.dedup();
        Self {
            lines: items.iter().map(|i| LineRef::from(*i)).collect(),
            snippets: Vec::new(),
            pages,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippets.push(snippet.into());
        self
    }

    pub fn line_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.line_id).collect()
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// One triggered compliance finding. Built once per analysis run and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: Uuid,
    pub case_id: Uuid,
    pub category: DetectionCategory,
    pub severity: Severity,
    pub explanation: String,
    pub evidence: Evidence,
    pub follow_up_questions: Vec<String>,
    pub citations: Vec<PolicyCitation>,
    pub detected_at: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Case context fields a detector is allowed to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    Narrative,
    NetworkStatus,
    SecondaryCoverage,
    EmergencyFlag,
    FacilityType,
    AncillaryVendors,
}

/// A single compliance rule. Detectors are independent of each other and of
/// evaluation order.
pub trait Detector: Send + Sync {
    fn category(&self) -> DetectionCategory;

    fn severity(&self) -> Severity;

    /// The case context fields this detector consults.
    fn reads(&self) -> &'static [ContextField];

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection>;
}

// ---------------------------------------------------------------------------
// ComplianceResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceResult {
    pub detections: Vec<Detection>,
    pub counts: HashMap<DetectionCategory, usize>,
    pub processing_time_ms: u64,
}

impl ComplianceResult {
    pub fn total(&self) -> usize {
        self.detections.len()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.detections.iter().map(|d| d.severity).max()
    }
}

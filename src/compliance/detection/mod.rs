//! The detector catalog and shared helpers.
//!
//! Detectors are grouped by what they look at: `charges` inspects individual
//! lines and their codes, `surprise` compares amounts across documents
//! against network status, `coverage` reads denial facts and the narrative.

pub mod charges;
pub mod coverage;
pub mod surprise;

use chrono::Local;
use uuid::Uuid;

use super::citations::citations_for;
use super::messages::follow_up_questions;
use super::types::{Detection, Detector, Evidence};
use crate::models::enums::DocType;
use crate::models::{CaseContext, KeyFacts, NormalizedLineItem};

pub use charges::{
    DuplicateDetector, FacilityFeeDetector, HighDrugUnitsDetector, MathErrorDetector,
    Modifier25Detector, ObservationStatusDetector, TherapyUnitsDetector, UnbundlingDetector,
};
pub use coverage::{
    CoordinationOfBenefitsDetector, MissingItemizationDetector, PreventiveDetector,
    PriorAuthorizationDetector, TimelyFilingDetector,
};
pub use surprise::{
    BalanceBillingDetector, EobZeroStillBilledDetector, GroundAmbulanceDetector,
    NsaAncillaryDetector, NsaEmergencyDetector,
};

/// Every detector, in catalog order.
pub fn default_catalog() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(DuplicateDetector),
        Box::new(UnbundlingDetector),
        Box::new(Modifier25Detector),
        Box::new(PreventiveDetector),
        Box::new(NsaEmergencyDetector),
        Box::new(NsaAncillaryDetector),
        Box::new(FacilityFeeDetector),
        Box::new(GroundAmbulanceDetector),
        Box::new(HighDrugUnitsDetector),
        Box::new(TherapyUnitsDetector),
        Box::new(TimelyFilingDetector),
        Box::new(CoordinationOfBenefitsDetector),
        Box::new(EobZeroStillBilledDetector),
        Box::new(BalanceBillingDetector),
        Box::new(MissingItemizationDetector),
        Box::new(MathErrorDetector),
        Box::new(ObservationStatusDetector),
        Box::new(PriorAuthorizationDetector),
    ]
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

const SNIPPET_CHARS: usize = 160;

/// Assemble a detection with the detector's fixed severity, citations and
/// follow-up questions.
///
/// The id is derived from the case, category and evidence so the same
/// finding gets the same id on every run.
pub(crate) fn finding(
    detector: &dyn Detector,
    ctx: &CaseContext,
    explanation: String,
    evidence: Evidence,
) -> Detection {
    let category = detector.category();
    let line_ids: Vec<String> = evidence.lines.iter().map(|l| l.line_id.to_string()).collect();
    let identity = format!(
        "{}:{}:{}",
        category.as_str(),
        line_ids.join(","),
        evidence.snippets.join("|")
    );

    Detection {
        id: Uuid::new_v5(&ctx.case_id, identity.as_bytes()),
        case_id: ctx.case_id,
        category,
        severity: detector.severity(),
        explanation,
        evidence,
        follow_up_questions: follow_up_questions(category),
        citations: citations_for(category),
        detected_at: Local::now().naive_local(),
    }
}

/// Sum of patient responsibility on lines of one document type, or `None`
/// when no such line carries the amount.
pub(crate) fn patient_resp_total(items: &[NormalizedLineItem], doc_type: DocType) -> Option<i64> {
    items
        .iter()
        .filter(|i| i.doc_type == doc_type)
        .filter_map(|i| i.patient_resp_cents)
        .fold(None, |acc, c| Some(acc.unwrap_or(0) + c))
}

/// The patient's largest stated share across document types. Bills and
/// EOBs often restate the same lines, so totals are not added across them.
pub(crate) fn patient_exposure(items: &[NormalizedLineItem]) -> i64 {
    [
        DocType::Bill,
        DocType::Eob,
        DocType::Portal,
        DocType::Letter,
        DocType::InsuranceCard,
        DocType::Unknown,
    ]
    .into_iter()
    .filter_map(|t| patient_resp_total(items, t))
    .max()
    .unwrap_or(0)
}

pub(crate) fn keyfacts(items: &[NormalizedLineItem]) -> impl Iterator<Item = (&NormalizedLineItem, &KeyFacts)> {
    items
        .iter()
        .filter_map(|i| i.keyfacts.as_ref().map(|k| (i, k)))
}

/// Case-insensitive phrase search over denial reasons and line descriptions.
pub(crate) fn documents_mention<'a>(
    items: &'a [NormalizedLineItem],
    phrases: &[&str],
) -> Option<&'a str> {
    let denial = keyfacts(items).filter_map(|(_, k)| k.denial_reason.as_deref());
    let descriptions = items.iter().filter_map(|i| i.description.as_deref());
    denial.chain(descriptions).find(|text| {
        let lower = text.to_lowercase();
        phrases.iter().any(|p| lower.contains(p))
    })
}

pub(crate) fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

//! Coverage and denial detectors. These read the facts pulled from denial
//! letters and portals, plus the patient's narrative.

use super::{documents_mention, finding, keyfacts, snippet};
use crate::compliance::codes;
use crate::compliance::messages::MessageTemplates;
use crate::compliance::types::{ContextField, Detection, Detector, Evidence, Severity};
use crate::models::enums::DetectionCategory;
use crate::models::{CaseContext, KeyFacts, NormalizedLineItem};

const TIMELY_FILING_CARC: &str = "29";
const COB_CARC: &str = "22";
const PRIOR_AUTH_CARCS: &[&str] = &["15", "62", "197"];

const TIMELY_FILING_PHRASES: &[&str] = &["timely filing", "filing limit", "filed late", "late filing"];
const COB_PHRASES: &[&str] = &[
    "coordination of benefits",
    "other insurance",
    "other coverage",
    "secondary insurance",
];
const ITEMIZATION_PHRASES: &[&str] = &["itemized", "itemization"];
const PRIOR_AUTH_PHRASES: &[&str] = &[
    "authorization",
    "authorisation",
    "referral",
    "precertification",
    "pre-certification",
];

/// Rows whose key facts carry the given CARC.
fn rows_with_carc<'a>(items: &'a [NormalizedLineItem], carc: &str) -> Vec<&'a NormalizedLineItem> {
    keyfacts(items)
        .filter(|(_, k)| k.has_carc(carc))
        .map(|(i, _)| i)
        .collect()
}

/// Evidence for a case-level finding: the matching rows, any matching
/// document text and, if it matched, the narrative.
fn case_evidence(
    rows: &[&NormalizedLineItem],
    document_text: Option<&str>,
    narrative: Option<&str>,
) -> Evidence {
    let mut evidence = Evidence::from_lines(rows);
    if let Some(text) = document_text {
        evidence = evidence.with_snippet(snippet(text));
    }
    if let Some(text) = narrative {
        evidence = evidence.with_snippet(snippet(text));
    }
    evidence
}

// ──────────────────────────────────────────────
// Preventive
// ──────────────────────────────────────────────

/// Preventive services with patient cost sharing.
pub struct PreventiveDetector;

impl PreventiveDetector {
    fn is_preventive(item: &NormalizedLineItem) -> bool {
        codes::is_preventive_code(item.code_str())
            || item
                .description
                .as_deref()
                .is_some_and(codes::mentions_preventive_diagnosis)
    }
}

impl Detector for PreventiveDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::Preventive
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        items
            .iter()
            .filter(|i| Self::is_preventive(i))
            // Modifier 33 marks the service as preventive for the payer already.
            .filter(|i| !i.has_modifier("33"))
            .filter_map(|i| {
                let resp = i.patient_resp_cents.filter(|c| *c > 0)?;
                Some(finding(
                    self,
                    ctx,
                    MessageTemplates::preventive(&i.label(), resp),
                    Evidence::from_lines(&[i]),
                ))
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Denials
// ──────────────────────────────────────────────

pub struct TimelyFilingDetector;

impl Detector for TimelyFilingDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::TimelyFiling
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::Narrative]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let rows = rows_with_carc(items, TIMELY_FILING_CARC);
        let text = documents_mention(items, TIMELY_FILING_PHRASES);
        let narrative = ctx
            .narrative_mentions(TIMELY_FILING_PHRASES)
            .then_some(ctx.narrative.as_str());

        if rows.is_empty() && text.is_none() && narrative.is_none() {
            return Vec::new();
        }
        vec![finding(
            self,
            ctx,
            MessageTemplates::timely_filing(),
            case_evidence(&rows, text, narrative),
        )]
    }
}

pub struct CoordinationOfBenefitsDetector;

impl Detector for CoordinationOfBenefitsDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::CoordinationOfBenefits
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::SecondaryCoverage, ContextField::Narrative]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let rows = rows_with_carc(items, COB_CARC);
        let text = documents_mention(items, COB_PHRASES);
        let narrative = ctx
            .narrative_mentions(COB_PHRASES)
            .then_some(ctx.narrative.as_str());

        if rows.is_empty()
            && text.is_none()
            && narrative.is_none()
            && !ctx.benefits.has_secondary_coverage
        {
            return Vec::new();
        }
        vec![finding(
            self,
            ctx,
            MessageTemplates::coordination_of_benefits(),
            case_evidence(&rows, text, narrative),
        )]
    }
}

/// The patient asked for an itemized bill and nothing itemized came back.
pub struct MissingItemizationDetector;

impl Detector for MissingItemizationDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::MissingItemization
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::Narrative]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        if !ctx.narrative_mentions(ITEMIZATION_PHRASES) || items.iter().any(|i| i.code.is_some()) {
            return Vec::new();
        }
        let evidence = Evidence::default().with_snippet(snippet(&ctx.narrative));
        vec![finding(self, ctx, MessageTemplates::missing_itemization(), evidence)]
    }
}

pub struct PriorAuthorizationDetector;

impl PriorAuthorizationDetector {
    fn denied_for_authorization(facts: &KeyFacts) -> bool {
        PRIOR_AUTH_CARCS.iter().any(|c| facts.has_carc(c))
            || facts.denial_reason.as_deref().is_some_and(|r| {
                let lower = r.to_lowercase();
                PRIOR_AUTH_PHRASES.iter().any(|p| lower.contains(p))
            })
    }
}

impl Detector for PriorAuthorizationDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::PriorAuthorization
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let matched: Vec<(&NormalizedLineItem, &KeyFacts)> = keyfacts(items)
            .filter(|(_, k)| Self::denied_for_authorization(k))
            .collect();
        if matched.is_empty() {
            return Vec::new();
        }

        let reason = matched.iter().find_map(|(_, k)| k.denial_reason.as_deref());
        let rows: Vec<&NormalizedLineItem> = matched.iter().map(|(i, _)| *i).collect();
        let mut evidence = Evidence::from_lines(&rows);
        if let Some(r) = reason {
            evidence = evidence.with_snippet(snippet(r));
        }
        vec![finding(
            self,
            ctx,
            MessageTemplates::prior_authorization(reason),
            evidence,
        )]
    }
}

//! Line-level coding detectors.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::finding;
use crate::compliance::codes;
use crate::compliance::messages::MessageTemplates;
use crate::compliance::types::{ContextField, Detection, Detector, Evidence, Severity};
use crate::models::enums::{DetectionCategory, DocType, FacilityType};
use crate::models::{CaseContext, NormalizedLineItem};

const DRUG_UNIT_LIMIT: u32 = 100;
/// 10 units of a 15-minute timed code, i.e. 150 minutes.
const THERAPY_UNIT_LIMIT: u32 = 10;

// ──────────────────────────────────────────────
// Duplicate
// ──────────────────────────────────────────────

/// Two or more lines of the same document type sharing code, date of
/// service and charge.
pub struct DuplicateDetector;

impl Detector for DuplicateDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::Duplicate
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let mut groups: BTreeMap<(&str, &str, NaiveDate, i64), Vec<&NormalizedLineItem>> =
            BTreeMap::new();
        for item in items {
            if let (Some(code), Some(dos), Some(charge)) =
                (item.code.as_deref(), item.date_of_service, item.charge_cents)
            {
                groups
                    .entry((item.doc_type.as_str(), code, dos, charge))
                    .or_default()
                    .push(item);
            }
        }

        groups
            .into_iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|((_, _, dos, charge), lines)| {
                let explanation = MessageTemplates::duplicate(
                    &lines[0].label(),
                    &dos.to_string(),
                    charge,
                    lines.len(),
                );
                finding(self, ctx, explanation, Evidence::from_lines(&lines))
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Unbundling
// ──────────────────────────────────────────────

/// A comprehensive code billed alongside a component it already includes.
pub struct UnbundlingDetector;

impl Detector for UnbundlingDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::Unbundling
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&NormalizedLineItem>> = BTreeMap::new();
        for item in items.iter().filter(|i| i.code.is_some()) {
            if let Some(dos) = item.date_of_service {
                by_date.entry(dos).or_default().push(item);
            }
        }

        let mut out = Vec::new();
        for (dos, lines) in &by_date {
            let find = |code: &str| lines.iter().find(|l| l.code_str() == code).copied();
            for (comprehensive, components) in codes::BUNDLED_PAIRS {
                let Some(parent) = find(comprehensive) else {
                    continue;
                };
                for component in *components {
                    if let Some(child) = find(component) {
                        let explanation =
                            MessageTemplates::unbundling(comprehensive, component, &dos.to_string());
                        out.push(finding(
                            self,
                            ctx,
                            explanation,
                            Evidence::from_lines(&[parent, child]),
                        ));
                    }
                }
            }
        }
        out
    }
}

// ──────────────────────────────────────────────
// Global surgery / modifier 25
// ──────────────────────────────────────────────

/// E/M visit on the same claim as a surgical procedure, without modifier 25.
pub struct Modifier25Detector;

impl Detector for Modifier25Detector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::GlobalSurgeryModifier25
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        // Lines without a printed claim reference are treated as one claim.
        let mut claims: BTreeMap<Option<&str>, Vec<&NormalizedLineItem>> = BTreeMap::new();
        for item in items.iter().filter(|i| i.code.is_some()) {
            claims.entry(item.claim_ref.as_deref()).or_default().push(item);
        }

        let mut out = Vec::new();
        for lines in claims.values() {
            let Some(surgical) = lines.iter().find(|l| codes::is_surgical_code(l.code_str())) else {
                continue;
            };
            for em in lines
                .iter()
                .filter(|l| codes::is_em_code(l.code_str()) && !l.has_modifier("25"))
            {
                let explanation = MessageTemplates::modifier_25(&em.label(), &surgical.label());
                out.push(finding(self, ctx, explanation, Evidence::from_lines(&[*em, *surgical])));
            }
        }
        out
    }
}

// ──────────────────────────────────────────────
// Units
// ──────────────────────────────────────────────

pub struct HighDrugUnitsDetector;

impl Detector for HighDrugUnitsDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::HighDrugUnits
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
            .filter(|i| codes::is_drug_code(i.code_str()))
            .filter_map(|i| i.units.filter(|u| *u > DRUG_UNIT_LIMIT).map(|u| (i, u)))
            .map(|(i, units)| {
                finding(
                    self,
                    ctx,
                    MessageTemplates::high_drug_units(&i.label(), units),
                    Evidence::from_lines(&[i]),
                )
            })
            .collect()
    }
}

pub struct TherapyUnitsDetector;

impl Detector for TherapyUnitsDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::TherapyUnits
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        items
            .iter()
            .filter(|i| codes::is_timed_therapy_code(i.code_str()))
            .filter_map(|i| i.units.filter(|u| *u > THERAPY_UNIT_LIMIT).map(|u| (i, u)))
            .map(|(i, units)| {
                finding(
                    self,
                    ctx,
                    MessageTemplates::therapy_units(&i.label(), units),
                    Evidence::from_lines(&[i]),
                )
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Math
// ──────────────────────────────────────────────

pub struct MathErrorDetector;

impl Detector for MathErrorDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::MathError
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        items
            .iter()
            .filter(|i| !i.validation.math_check)
            .map(|i| {
                finding(
                    self,
                    ctx,
                    MessageTemplates::math_error(&i.label()),
                    Evidence::from_lines(&[i]),
                )
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Facility fee
// ──────────────────────────────────────────────

/// G0463 or clinic revenue code billed at a hospital outpatient location.
pub struct FacilityFeeDetector;

impl Detector for FacilityFeeDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::FacilityFee
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::FacilityType]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let outpatient_case = ctx.flags.facility_type == Some(FacilityType::HospitalOutpatient);

        items
            .iter()
            .filter(|i| {
                i.code_str() == codes::FACILITY_FEE_CODE
                    || i.rev_code.as_deref().is_some_and(codes::is_clinic_rev_code)
            })
            .filter(|i| {
                outpatient_case
                    || i.place_of_service
                        .as_deref()
                        .is_some_and(|p| codes::HOSPITAL_OUTPATIENT_POS.contains(&p))
            })
            .map(|i| {
                finding(
                    self,
                    ctx,
                    MessageTemplates::facility_fee(&i.label()),
                    Evidence::from_lines(&[i]),
                )
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Observation
// ──────────────────────────────────────────────

pub struct ObservationStatusDetector;

impl Detector for ObservationStatusDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::ObservationStatus
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::Narrative]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let lines: Vec<&NormalizedLineItem> = items
            .iter()
            .filter(|i| {
                codes::is_observation_code(i.code_str())
                    || i.rev_code.as_deref().is_some_and(codes::is_observation_rev_code)
                    || (i.doc_type != DocType::Letter
                        && i.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains("observation")))
            })
            .collect();

        let narrative_says_admitted = ctx.narrative_mentions(&["observation"])
            && ctx.narrative_mentions(&["admitted", "admission", "inpatient"]);

        if lines.is_empty() && !narrative_says_admitted {
            return Vec::new();
        }

        let mut evidence = Evidence::from_lines(&lines);
        if narrative_says_admitted {
            evidence = evidence.with_snippet(super::snippet(&ctx.narrative));
        }
        vec![finding(self, ctx, MessageTemplates::observation_status(), evidence)]
    }
}

//! Surprise and balance billing: amounts owed compared against network
//! status and against what the plan says the patient owes.

use super::{finding, patient_exposure, patient_resp_total, snippet};
use crate::compliance::codes;
use crate::compliance::messages::MessageTemplates;
use crate::compliance::types::{ContextField, Detection, Detector, Evidence, Severity};
use crate::models::enums::{DetectionCategory, DocType, FacilityType};
use crate::models::{CaseContext, NormalizedLineItem};

/// Patient share above which an emergency visit with ancillary providers is
/// flagged, in cents.
pub const NSA_EMERGENCY_THRESHOLD_CENTS: i64 = 100_000;

const BALANCE_BILL_PHRASES: &[&str] = &[
    "balance bill",
    "billed me the difference",
    "billing me the difference",
    "charged the difference",
    "above what insurance allowed",
];

fn is_emergency_line(item: &NormalizedLineItem) -> bool {
    item.place_of_service.as_deref() == Some(codes::EMERGENCY_POS)
        || item.rev_code.as_deref().is_some_and(codes::is_er_rev_code)
}

fn ancillary_lines(items: &[NormalizedLineItem]) -> Vec<&NormalizedLineItem> {
    items
        .iter()
        .filter(|i| codes::is_ancillary_code(i.code_str()))
        .collect()
}

// ──────────────────────────────────────────────
// No Surprises Act
// ──────────────────────────────────────────────

/// Emergency care with ancillary providers and a large patient share.
pub struct NsaEmergencyDetector;

impl Detector for NsaEmergencyDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::NsaEmergency
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn reads(&self) -> &'static [ContextField] {
        &[
            ContextField::EmergencyFlag,
            ContextField::FacilityType,
            ContextField::AncillaryVendors,
        ]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let emergency_lines: Vec<&NormalizedLineItem> =
            items.iter().filter(|i| is_emergency_line(i)).collect();
        let emergency = !emergency_lines.is_empty()
            || ctx.flags.emergency
            || matches!(
                ctx.flags.facility_type,
                Some(FacilityType::EmergencyDepartment | FacilityType::FreestandingEr)
            );

        let ancillary = ancillary_lines(items);
        let has_ancillary = !ancillary.is_empty() || !ctx.flags.ancillary_vendors.is_empty();

        let exposure = patient_exposure(items);
        if !emergency || !has_ancillary || exposure <= NSA_EMERGENCY_THRESHOLD_CENTS {
            return Vec::new();
        }

        let mut lines = emergency_lines;
        for line in ancillary.into_iter().chain(items.iter().filter(|i| i.patient_resp_cents.is_some())) {
            if !lines.iter().any(|l| l.line_id == line.line_id) {
                lines.push(line);
            }
        }

        let mut evidence = Evidence::from_lines(&lines);
        for vendor in &ctx.flags.ancillary_vendors {
            evidence = evidence.with_snippet(format!("Ancillary provider: {vendor}"));
        }
        vec![finding(self, ctx, MessageTemplates::nsa_emergency(exposure), evidence)]
    }
}

/// Ancillary services at an in-network facility.
pub struct NsaAncillaryDetector;

impl Detector for NsaAncillaryDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::NsaAncillary
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[
            ContextField::NetworkStatus,
            ContextField::FacilityType,
            ContextField::AncillaryVendors,
        ]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let facility = ctx
            .flags
            .facility_type
            .is_some_and(|f| f.is_hospital() || f == FacilityType::AmbulatorySurgeryCenter);
        if !ctx.is_in_network() || !facility {
            return Vec::new();
        }

        let lines = ancillary_lines(items);
        if lines.is_empty() && ctx.flags.ancillary_vendors.is_empty() {
            return Vec::new();
        }

        let names = if ctx.flags.ancillary_vendors.is_empty() {
            lines
                .iter()
                .map(|l| l.code_str().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            ctx.flags.ancillary_vendors.join(", ")
        };
        vec![finding(
            self,
            ctx,
            MessageTemplates::nsa_ancillary(&names),
            Evidence::from_lines(&lines),
        )]
    }
}

pub struct GroundAmbulanceDetector;

impl Detector for GroundAmbulanceDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::GroundAmbulance
    }

    fn severity(&self) -> Severity {
        Severity::Warn
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::NetworkStatus]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        if !ctx.is_out_of_network() {
            return Vec::new();
        }
        items
            .iter()
            .filter(|i| codes::is_ground_ambulance_code(i.code_str()))
            .map(|i| {
                finding(
                    self,
                    ctx,
                    MessageTemplates::ground_ambulance(&i.label()),
                    Evidence::from_lines(&[i]),
                )
            })
            .collect()
    }
}

// ──────────────────────────────────────────────
// Bill vs EOB
// ──────────────────────────────────────────────

/// The plan says the patient owes nothing, but a bill asks for payment.
pub struct EobZeroStillBilledDetector;

impl Detector for EobZeroStillBilledDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::EobZeroStillBilled
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn reads(&self) -> &'static [ContextField] {
        &[]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        let (Some(eob), Some(bill)) = (
            patient_resp_total(items, DocType::Eob),
            patient_resp_total(items, DocType::Bill),
        ) else {
            return Vec::new();
        };
        if eob != 0 || bill <= 0 {
            return Vec::new();
        }

        let lines: Vec<&NormalizedLineItem> = items
            .iter()
            .filter(|i| {
                matches!(i.doc_type, DocType::Eob | DocType::Bill) && i.patient_resp_cents.is_some()
            })
            .collect();
        vec![finding(
            self,
            ctx,
            MessageTemplates::eob_zero_still_billed(bill),
            Evidence::from_lines(&lines),
        )]
    }
}

/// An in-network provider billing more than the EOB's patient share.
pub struct BalanceBillingDetector;

impl Detector for BalanceBillingDetector {
    fn category(&self) -> DetectionCategory {
        DetectionCategory::BalanceBilling
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn reads(&self) -> &'static [ContextField] {
        &[ContextField::NetworkStatus, ContextField::Narrative]
    }

    fn detect(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> Vec<Detection> {
        if !ctx.is_in_network() {
            return Vec::new();
        }

        let amounts = (
            patient_resp_total(items, DocType::Bill),
            patient_resp_total(items, DocType::Eob),
        );
        if let (Some(bill), Some(eob)) = amounts {
            if bill > eob {
                let lines: Vec<&NormalizedLineItem> = items
                    .iter()
                    .filter(|i| {
                        matches!(i.doc_type, DocType::Eob | DocType::Bill)
                            && i.patient_resp_cents.is_some()
                    })
                    .collect();
                return vec![finding(
                    self,
                    ctx,
                    MessageTemplates::balance_billing(bill, eob),
                    Evidence::from_lines(&lines),
                )];
            }
        }

        if ctx.narrative_mentions(BALANCE_BILL_PHRASES) {
            let evidence = Evidence::default().with_snippet(snippet(&ctx.narrative));
            return vec![finding(
                self,
                ctx,
                MessageTemplates::balance_billing_narrative(),
                evidence,
            )];
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::models::enums::NetworkStatus;
    use crate::models::{Benefits, InferredFlags};

    fn in_network(mut ctx: CaseContext) -> CaseContext {
        ctx.benefits = Benefits {
            network_status: Some(NetworkStatus::InNetwork),
            ..Default::default()
        };
        ctx
    }

    fn eob_line(row: usize, resp: i64) -> NormalizedLineItem {
        let mut l = item(row, "99283");
        l.doc_type = DocType::Eob;
        l.patient_resp_cents = Some(resp);
        l
    }

    fn bill_line(row: usize, resp: i64) -> NormalizedLineItem {
        let mut l = item(row, "99283");
        l.patient_resp_cents = Some(resp);
        l
    }

    // ── NSA emergency ──

    fn emergency_case() -> (Vec<NormalizedLineItem>, CaseContext) {
        let mut er = item(0, "99285");
        er.place_of_service = Some("23".into());
        er.patient_resp_cents = Some(150_000);
        let ctx = ctx().with_flags(InferredFlags {
            emergency: true,
            facility_type: None,
            ancillary_vendors: vec!["Valley Anesthesia Group".into()],
        });
        (vec![er], ctx)
    }

    #[test]
    fn emergency_with_ancillary_and_large_share_is_high() {
        let (items, ctx) = emergency_case();
        let found = NsaEmergencyDetector.detect(&items, &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, DetectionCategory::NsaEmergency);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].evidence.lines.len(), 1);
        assert!(found[0].evidence.snippets[0].contains("Valley Anesthesia"));
    }

    #[test]
    fn share_at_threshold_is_not_flagged() {
        let (mut items, ctx) = emergency_case();
        items[0].patient_resp_cents = Some(NSA_EMERGENCY_THRESHOLD_CENTS);
        assert!(NsaEmergencyDetector.detect(&items, &ctx).is_empty());
    }

    #[test]
    fn ancillary_code_substitutes_for_vendor_list() {
        let (mut items, _) = emergency_case();
        items.push(item(1, "00840"));
        let ctx = ctx();
        let found = NsaEmergencyDetector.detect(&items, &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].evidence.lines.len(), 2);
    }

    #[test]
    fn no_emergency_indicator_no_finding() {
        let mut line = item(0, "00840");
        line.patient_resp_cents = Some(500_000);
        assert!(NsaEmergencyDetector.detect(&[line], &ctx()).is_empty());
    }

    #[test]
    fn er_revenue_code_counts_as_emergency() {
        let mut er = item(0, "99284");
        er.rev_code = Some("450".into());
        er.patient_resp_cents = Some(200_000);
        let found = NsaEmergencyDetector.detect(&[er, item(1, "71046")], &ctx());
        assert_eq!(found.len(), 1);
    }

    // ── NSA ancillary ──

    #[test]
    fn ancillary_at_in_network_hospital() {
        let mut ctx = in_network(ctx());
        ctx.flags.facility_type = Some(FacilityType::HospitalInpatient);
        let found = NsaAncillaryDetector.detect(&[item(0, "00840")], &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Warn);

        ctx.flags.facility_type = Some(FacilityType::PhysicianOffice);
        assert!(NsaAncillaryDetector.detect(&[item(0, "00840")], &ctx).is_empty());
    }

    // ── ground ambulance ──

    #[test]
    fn out_of_network_ground_ambulance() {
        let mut ctx = ctx();
        ctx.benefits.network_status = Some(NetworkStatus::OutOfNetwork);
        assert_eq!(GroundAmbulanceDetector.detect(&[item(0, "A0427")], &ctx).len(), 1);
        assert!(GroundAmbulanceDetector.detect(&[item(0, "A0427")], &in_network(ctx)).is_empty());
    }

    // ── EOB vs bill ──

    #[test]
    fn eob_zero_but_bill_due() {
        let items = vec![eob_line(0, 0), bill_line(1, 5000)];
        let found = EobZeroStillBilledDetector.detect(&items, &ctx());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].evidence.lines.len(), 2);
    }

    #[test]
    fn eob_with_share_is_not_zero_billed() {
        let items = vec![eob_line(0, 2000), bill_line(1, 5000)];
        assert!(EobZeroStillBilledDetector.detect(&items, &ctx()).is_empty());
    }

    #[test]
    fn missing_eob_is_not_zero() {
        assert!(EobZeroStillBilledDetector.detect(&[bill_line(0, 5000)], &ctx()).is_empty());
    }

    #[test]
    fn in_network_bill_above_eob_is_balance_billing() {
        let items = vec![eob_line(0, 2000), bill_line(1, 5000)];
        let found = BalanceBillingDetector.detect(&items, &in_network(ctx()));
        assert_eq!(found.len(), 1);
        assert!(found[0].explanation.contains("$50.00"));
        assert!(BalanceBillingDetector.detect(&items, &ctx()).is_empty());
    }

    #[test]
    fn balance_bill_narrative_with_in_network() {
        let ctx = in_network(ctx()).with_narrative("The surgeon's office balance billed me $900.");
        let found = BalanceBillingDetector.detect(&[], &ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].evidence.snippets.len(), 1);
    }
}

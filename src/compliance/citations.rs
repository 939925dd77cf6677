//! Policy citation catalog and run-level citation compilation.

use std::collections::HashSet;

use super::types::{Detection, PolicyCitation};
use crate::models::enums::{Authority, DetectionCategory};

/// Sources every patient can rely on regardless of what was found.
pub fn universal_citations() -> Vec<PolicyCitation> {
    vec![
        PolicyCitation::new(
            "Internal claims and appeals and external review processes",
            Authority::Federal,
            "45 CFR §147.136",
        ),
        PolicyCitation::new(
            "ERISA claims procedure",
            Authority::Federal,
            "29 CFR §2560.503-1",
        ),
    ]
}

/// Citations a detector attaches to each of its findings.
pub fn citations_for(category: DetectionCategory) -> Vec<PolicyCitation> {
    use Authority::*;
    use DetectionCategory as C;

    let c = PolicyCitation::new;
    match category {
        C::Duplicate => vec![
            c("Medicare Claims Processing Manual, duplicate claim edits", Cms, "Pub. 100-04, Ch. 1, §120"),
            c("False Claims Act", Federal, "31 USC §3729"),
        ],
        C::Unbundling => vec![
            c("NCCI Policy Manual, general correct coding policies", Cms, "NCCI Policy Manual, Ch. I"),
            c("NCCI procedure-to-procedure edits", Cms, "NCCI PTP Edits"),
        ],
        C::GlobalSurgeryModifier25 => vec![
            c("Global surgery payment rules", Cms, "Pub. 100-04, Ch. 12, §40"),
            c("Significant, separately identifiable E/M service (modifier 25)", Cms, "Pub. 100-04, Ch. 12, §30.6.6"),
        ],
        C::Preventive => vec![
            c("Essential health benefits: preventive and wellness services", Federal, "42 USC §18022(b)(1)"),
            c("Coverage of preventive health services without cost sharing", Federal, "42 USC §300gg-13"),
            c("Preventive health services", Federal, "45 CFR §147.130"),
        ],
        C::NsaEmergency => vec![
            c("No Surprises Act: emergency services", Federal, "42 USC §300gg-111"),
            c("Emergency services protections", Federal, "45 CFR §149.110"),
            c("Nonparticipating provider balance billing prohibition", Federal, "42 USC §300gg-131"),
        ],
        C::NsaAncillary => vec![
            c("No Surprises Act: non-emergency services at participating facilities", Federal, "42 USC §300gg-132"),
            c("Ancillary services exempt from notice and consent", Federal, "45 CFR §149.420(b)"),
        ],
        C::FacilityFee => vec![
            c("Hospital outpatient clinic visits (G0463)", Cms, "Pub. 100-04, Ch. 4, §160"),
            c("State hospital facility fee disclosure requirements", StateDoi, "State facility fee notice statutes"),
        ],
        C::GroundAmbulance => vec![
            c("Ground ambulance advisory committee", Federal, "Consolidated Appropriations Act, 2021, Div. BB, §117"),
            c("State ground ambulance balance billing protections", StateDoi, "State ground ambulance statutes"),
        ],
        C::HighDrugUnits => vec![
            c("Drugs and biologicals billing, units and discarded amounts", Cms, "Pub. 100-04, Ch. 17, §40"),
            c("Medically unlikely edits", Cms, "NCCI MUE Table"),
        ],
        C::TherapyUnits => vec![
            c("Timed therapy codes and the 8-minute rule", Cms, "Pub. 100-04, Ch. 5, §20.2"),
            c("Medically unlikely edits", Cms, "NCCI MUE Table"),
        ],
        C::TimelyFiling => vec![
            c("Time limits for filing claims", Cms, "42 CFR §424.44"),
            c("Provider agreement timely filing limits", PayerPolicy, "Participating provider agreement"),
        ],
        C::CoordinationOfBenefits => vec![
            c("Coordination of Benefits Model Regulation", StateDoi, "NAIC Model Regulation 120"),
            c("Medicare secondary payer provisions", Federal, "42 CFR §411.20"),
        ],
        C::EobZeroStillBilled => vec![
            c("Content of adverse benefit determination notices", Federal, "29 CFR §2560.503-1(g)"),
            c("In-network hold-harmless provisions", PayerPolicy, "Participating provider agreement"),
        ],
        C::BalanceBilling => vec![
            c("Nonparticipating provider balance billing prohibition", Federal, "42 USC §300gg-131"),
            c("In-network hold-harmless provisions", PayerPolicy, "Participating provider agreement"),
            c("State balance billing protections", StateDoi, "State balance billing statutes"),
        ],
        C::MissingItemization => vec![
            c("Hospital price transparency: standard charges", Federal, "45 CFR §180.50"),
            c("Patient right to an itemized bill", StateDoi, "State itemized bill statutes"),
        ],
        C::MathError => vec![
            c("Content of adverse benefit determination notices", Federal, "29 CFR §2560.503-1(g)"),
        ],
        C::ObservationStatus => vec![
            c("Medicare Outpatient Observation Notice (NOTICE Act)", Federal, "42 USC §1395cc(a)(1)(Y)"),
            c("Outpatient observation services", Cms, "Pub. 100-02, Ch. 6, §20.6"),
        ],
        C::PriorAuthorization => vec![
            c("Pre-service claims", Federal, "29 CFR §2560.503-1(m)(2)"),
            c("No prior authorization for emergency services", Federal, "42 USC §300gg-111(a)(1)"),
        ],
    }
}

pub struct CitationCompiler;

impl CitationCompiler {
    /// Deduplicate every detection's citations by (authority, citation) in
    /// first-seen order, then append the universal citations not already
    /// present.
    pub fn compile(detections: &[Detection]) -> Vec<PolicyCitation> {
        let universal = universal_citations();
        let mut seen = HashSet::new();

        detections
            .iter()
            .flat_map(|d| d.citations.iter())
            .chain(universal.iter())
            .filter(|&c| seen.insert(c.key()))
            .cloned()
            .collect()
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FacilityType, NetworkStatus, PlanType};

/// Bumped whenever a field is added to or removed from `CaseContext`.
pub const CASE_CONTEXT_VERSION: u16 = 1;

/// Caller-owned description of the case under review. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub version: u16,
    pub case_id: Uuid,
    /// The patient's own description of what happened.
    pub narrative: String,
    pub benefits: Benefits,
    pub flags: InferredFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Benefits {
    pub plan_type: Option<PlanType>,
    pub network_status: Option<NetworkStatus>,
    pub deductible_cents: Option<i64>,
    pub deductible_met_cents: Option<i64>,
    /// Coinsurance as a whole percentage (20 = 20%).
    pub coinsurance_pct: Option<u8>,
    pub out_of_pocket_max_cents: Option<i64>,
    pub has_secondary_coverage: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferredFlags {
    pub emergency: bool,
    pub facility_type: Option<FacilityType>,
    /// Names of ancillary vendors (anesthesia, radiology, pathology, ...) on the case.
    pub ancillary_vendors: Vec<String>,
}

impl CaseContext {
    pub fn new(case_id: Uuid) -> Self {
        Self {
            version: CASE_CONTEXT_VERSION,
            case_id,
            narrative: String::new(),
            benefits: Benefits::default(),
            flags: InferredFlags::default(),
        }
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    pub fn with_benefits(mut self, benefits: Benefits) -> Self {
        self.benefits = benefits;
        self
    }

    pub fn with_flags(mut self, flags: InferredFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_in_network(&self) -> bool {
        self.benefits.network_status == Some(NetworkStatus::InNetwork)
    }

    pub fn is_out_of_network(&self) -> bool {
        self.benefits.network_status == Some(NetworkStatus::OutOfNetwork)
    }

    /// Case-insensitive search of the narrative for any of the phrases.
    pub fn narrative_mentions(&self, phrases: &[&str]) -> bool {
        let lower = self.narrative.to_lowercase();
        phrases.iter().any(|p| lower.contains(p))
    }
}

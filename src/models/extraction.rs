use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CodeSystem, DocType};

// ---------------------------------------------------------------------------
// KeyFacts
// ---------------------------------------------------------------------------

/// Free-form facts read off unstructured documents (denial letters,
/// insurance cards, portal screenshots).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFacts {
    #[serde(default)]
    pub denial_reason: Option<String>,
    #[serde(default)]
    pub carc_codes: Vec<String>,
    #[serde(default)]
    pub rarc_codes: Vec<String>,
    #[serde(default)]
    pub auth_or_referral: Option<String>,
    #[serde(default)]
    pub claim_or_account_ref: Option<String>,
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub pcn: Option<String>,
    #[serde(default)]
    pub grp: Option<String>,
    #[serde(default)]
    pub member_id_masked: Option<String>,
}

impl KeyFacts {
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_ref().map_or(true, |s| s.trim().is_empty());
        blank(&self.denial_reason)
            && self.carc_codes.is_empty()
            && self.rarc_codes.is_empty()
            && blank(&self.auth_or_referral)
            && blank(&self.claim_or_account_ref)
            && blank(&self.bin)
            && blank(&self.pcn)
            && blank(&self.grp)
            && blank(&self.member_id_masked)
    }

    /// CARC codes are compared without their group prefix ("CO-29" == "29").
    pub fn has_carc(&self, code: &str) -> bool {
        self.carc_codes.iter().any(|c| strip_group_code(c) == code)
    }
}

fn strip_group_code(code: &str) -> &str {
    let trimmed = code.trim();
    match trimmed.split_once('-') {
        Some((group, rest)) if group.chars().all(|c| c.is_ascii_alphabetic()) => rest.trim(),
        _ => trimmed,
    }
}

// ---------------------------------------------------------------------------
// ExtractionRow
// ---------------------------------------------------------------------------

/// One visible service line as transcribed by one vendor on one page.
/// All values are still raw vendor strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRow {
    pub vendor: String,
    pub page: u32,
    pub row_index: usize,
    pub doc_type: Option<DocType>,
    pub code: Option<String>,
    pub code_system: Option<String>,
    pub modifiers: Vec<String>,
    pub description: Option<String>,
    pub units: Option<String>,
    pub dos: Option<String>,
    pub pos: Option<String>,
    pub rev_code: Option<String>,
    pub npi: Option<String>,
    pub charge: Option<String>,
    pub allowed: Option<String>,
    pub plan_paid: Option<String>,
    pub patient_resp: Option<String>,
    pub keyfacts: Option<KeyFacts>,
}

impl ExtractionRow {
    pub fn has_keyfacts(&self) -> bool {
        self.keyfacts.as_ref().is_some_and(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ValidatorResult
// ---------------------------------------------------------------------------

/// A field that failed its format rule and was normalized to null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub raw: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResult {
    /// At least one of the four money fields parsed.
    pub row_has_money: bool,
    /// Every money string the vendor supplied matched the money pattern.
    pub regex_pass: bool,
    /// Charge/allowed/paid/responsibility add up where they can be checked.
    pub math_check: bool,
    pub issues: Vec<FieldIssue>,
}

impl Default for ValidatorResult {
    fn default() -> Self {
        Self {
            row_has_money: false,
            regex_pass: true,
            math_check: true,
            issues: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizedLineItem
// ---------------------------------------------------------------------------

/// The canonical form of one logical service line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLineItem {
    pub line_id: Uuid,
    pub case_id: Uuid,
    pub artifact_id: Uuid,
    pub page: u32,
    pub row_index: usize,
    pub doc_type: DocType,
    pub code: Option<String>,
    pub code_system: Option<CodeSystem>,
    pub modifiers: Vec<String>,
    pub description: Option<String>,
    pub units: Option<u32>,
    pub date_of_service: Option<NaiveDate>,
    pub place_of_service: Option<String>,
    pub rev_code: Option<String>,
    pub provider_npi: Option<String>,
    pub provider_name: Option<String>,
    pub claim_ref: Option<String>,
    pub charge_cents: Option<i64>,
    pub allowed_cents: Option<i64>,
    pub plan_paid_cents: Option<i64>,
    pub patient_resp_cents: Option<i64>,
    pub keyfacts: Option<KeyFacts>,
    pub consensus: f64,
    pub low_confidence: bool,
    pub validation: ValidatorResult,
    pub source_vendor: String,
}

impl NormalizedLineItem {
    /// Deterministic line identity: the same artifact, page and row always
    /// map to the same id.
    pub fn make_line_id(artifact_id: &Uuid, page: u32, row_index: usize) -> Uuid {
        Uuid::new_v5(artifact_id, format!("page:{page}:row:{row_index}").as_bytes())
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m.eq_ignore_ascii_case(modifier))
    }

    pub fn code_str(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    /// Display label used in evidence and explanations.
    pub fn label(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{code} ({desc})"),
            (Some(code), None) => code.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => format!("page {} line {}", self.page, self.row_index + 1),
        }
    }

    pub fn has_any_money(&self) -> bool {
        self.charge_cents.is_some()
            || self.allowed_cents.is_some()
            || self.plan_paid_cents.is_some()
            || self.patient_resp_cents.is_some()
    }
}

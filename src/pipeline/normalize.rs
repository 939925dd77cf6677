//! Field normalization: raw vendor strings to typed values.
//!
//! Every function here is pure and total. A value that fails its format
//! rule becomes `None` and is reported as a `FieldIssue`; nothing panics and
//! nothing is guessed.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vendor::{VendorHeader, VendorResponse, VendorTotals};
use crate::models::enums::{CodeSystem, DocType};
use crate::models::{ExtractionRow, FieldIssue, KeyFacts, NormalizedLineItem, ValidatorResult};

/// Plan paid + patient responsibility may drift from allowed by this much.
pub const MATH_TOLERANCE_CENTS: i64 = 100;

static MONEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-(]?\s*\$?\s*(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?\s*\)?\s*$").unwrap()
});

static CPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").unwrap());
static HCPCS_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]\d{4}$").unwrap());
static REV_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}$").unwrap());
static POS_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}$").unwrap());
static MODIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2}$").unwrap());

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];

/// Identifies the page a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub case_id: Uuid,
    pub artifact_id: Uuid,
    pub page: u32,
}

// ──────────────────────────────────────────────
// Scalar normalizers
// ──────────────────────────────────────────────

/// Parse a printed money amount into integer cents.
///
/// Everything except digits and `.` is stripped, then the remainder is read
/// as an exact decimal and rounded half-up to the cent. Returns `None` when
/// nothing numeric remains; never returns 0 for garbage.
pub fn parse_money_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut parts = cleaned.split('.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next().unwrap_or("");
    if parts.next().is_some() || (whole.is_empty() && frac.is_empty()) {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    let frac_digits: Vec<i64> = frac.bytes().map(|b| i64::from(b - b'0')).collect();
    let tenths = frac_digits.first().copied().unwrap_or(0);
    let hundredths = frac_digits.get(1).copied().unwrap_or(0);
    let round_up = frac_digits.get(2).is_some_and(|d| *d >= 5);

    whole_value
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))
}

/// Whether a money string looks like a printed currency amount.
pub fn money_matches_pattern(raw: &str) -> bool {
    MONEY_PATTERN.is_match(raw)
}

fn code_pattern(system: CodeSystem) -> &'static Regex {
    match system {
        CodeSystem::Cpt => &CPT_PATTERN,
        CodeSystem::Hcpcs => &HCPCS_PATTERN,
        CodeSystem::Rev => &REV_PATTERN,
        CodeSystem::Pos => &POS_PATTERN,
    }
}

/// Validate a procedure/revenue/place code against its code system.
///
/// A recognised `system_hint` must match its own pattern. Without a usable
/// hint the system is inferred from the code's shape.
pub fn normalize_code(
    raw: Option<&str>,
    system_hint: Option<&str>,
) -> Option<(String, CodeSystem)> {
    let code = raw?.trim().to_ascii_uppercase();
    if code.is_empty() {
        return None;
    }

    let hinted = system_hint.and_then(|h| h.trim().to_ascii_uppercase().parse::<CodeSystem>().ok());
    match hinted {
        Some(system) => code_pattern(system).is_match(&code).then_some((code, system)),
        None => [CodeSystem::Cpt, CodeSystem::Hcpcs, CodeSystem::Rev, CodeSystem::Pos]
            .into_iter()
            .find(|s| code_pattern(*s).is_match(&code))
            .map(|s| (code, s)),
    }
}

pub fn normalize_rev_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    REV_PATTERN.is_match(trimmed).then(|| trimmed.to_string())
}

pub fn normalize_pos(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    POS_PATTERN.is_match(trimmed).then(|| trimmed.to_string())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(trimmed, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
                .map(|dt| dt.date())
        })
}

/// Ten digits passing the Luhn check over the `80840` card-issuer prefix.
pub fn normalize_npi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() != 10 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let full = format!("80840{trimmed}");
    let sum: u32 = full
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    (sum % 10 == 0).then(|| trimmed.to_string())
}

/// Upper-cased two-character modifiers, first occurrence kept.
pub fn normalize_modifiers(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in raw {
        let m = m.trim().to_ascii_uppercase();
        if MODIFIER_PATTERN.is_match(&m) && !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

/// Whole, non-negative unit counts. `"2.0"` is accepted, `"1.5"` is not.
pub fn parse_units(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    match trimmed.split_once('.') {
        Some((whole, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => {
            whole.parse().ok()
        }
        Some(_) => None,
        None => trimmed.parse().ok(),
    }
}

pub fn normalize_description(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Internal consistency of a row's money fields. Checks that cannot be made
/// for lack of data pass.
pub fn check_math(
    charge: Option<i64>,
    allowed: Option<i64>,
    plan_paid: Option<i64>,
    patient_resp: Option<i64>,
) -> bool {
    let allowed_within_charge = match (allowed, charge) {
        (Some(a), Some(c)) => a <= c,
        _ => true,
    };
    let split_adds_up = match (plan_paid, patient_resp, allowed) {
        (Some(p), Some(r), Some(a)) => (p + r - a).abs() <= MATH_TOLERANCE_CENTS,
        _ => true,
    };
    allowed_within_charge && split_adds_up
}

// ──────────────────────────────────────────────
// Row normalization
// ──────────────────────────────────────────────

/// Flatten one vendor response into per-row records.
///
/// Page-level keyfacts ride on the first row; a page that has keyfacts but
/// no service lines yields a single synthetic row carrying them.
pub fn rows_from_response(vendor: &str, page: u32, response: &VendorResponse) -> Vec<ExtractionRow> {
    let doc_type = Some(DocType::from_vendor(response.doc_type.as_deref()));
    let keyfacts = KeyFacts::from(response.keyfacts.clone());
    let keyfacts = (!keyfacts.is_empty()).then_some(keyfacts);

    let mut rows: Vec<ExtractionRow> = response
        .rows
        .iter()
        .enumerate()
        .map(|(row_index, r)| ExtractionRow {
            vendor: vendor.to_string(),
            page,
            row_index,
            doc_type,
            code: r.code.clone(),
            code_system: r.code_system.clone(),
            modifiers: r.modifiers.clone(),
            description: r.description.clone(),
            units: r.units.clone(),
            dos: r.dos.clone(),
            pos: r.pos.clone(),
            rev_code: r.rev_code.clone(),
            npi: r.npi.clone(),
            charge: r.charge.clone(),
            allowed: r.allowed.clone(),
            plan_paid: r.plan_paid.clone(),
            patient_resp: r.patient_resp.clone(),
            keyfacts: None,
        })
        .collect();

    if let Some(first) = rows.first_mut() {
        first.keyfacts = keyfacts;
    } else if keyfacts.is_some() {
        rows.push(ExtractionRow {
            vendor: vendor.to_string(),
            page,
            row_index: 0,
            doc_type,
            keyfacts,
            ..Default::default()
        });
    }

    rows
}

/// Typed view of a row, before consensus and header data are applied.
pub fn normalize_row(key: &PageKey, row: &ExtractionRow) -> NormalizedLineItem {
    let mut issues = Vec::new();

    fn check<T>(
        issues: &mut Vec<FieldIssue>,
        field: &str,
        raw: Option<&str>,
        reason: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = raw?;
        let parsed = parse(raw);
        if parsed.is_none() {
            issues.push(FieldIssue {
                field: field.to_string(),
                raw: raw.to_string(),
                reason: reason.to_string(),
            });
        }
        parsed
    }

    let code = check(
        &mut issues,
        "code",
        row.code.as_deref(),
        "not a valid CPT, HCPCS, revenue or place-of-service code",
        |c| normalize_code(Some(c), row.code_system.as_deref()),
    );
    let description = row.description.as_deref().and_then(normalize_description);
    let units = check(&mut issues, "units", row.units.as_deref(), "not a whole number", parse_units);
    let dos = check(&mut issues, "dos", row.dos.as_deref(), "unrecognised date", parse_date);
    let pos = check(&mut issues, "pos", row.pos.as_deref(), "not a two-digit place of service", normalize_pos);
    let rev_code = check(
        &mut issues,
        "rev_code",
        row.rev_code.as_deref(),
        "not a three-digit revenue code",
        normalize_rev_code,
    );
    let npi = check(&mut issues, "npi", row.npi.as_deref(), "failed NPI check digit", normalize_npi);

    let mut regex_pass = true;
    let mut money = |field: &str, raw: Option<&str>| -> Option<i64> {
        let raw = raw?;
        if !money_matches_pattern(raw) {
            regex_pass = false;
        }
        let cents = parse_money_cents(raw);
        if cents.is_none() {
            issues.push(FieldIssue {
                field: field.to_string(),
                raw: raw.to_string(),
                reason: "not a money amount".to_string(),
            });
        } else if !money_matches_pattern(raw) {
            issues.push(FieldIssue {
                field: field.to_string(),
                raw: raw.to_string(),
                reason: "unexpected money format".to_string(),
            });
        }
        cents
    };
    let charge = money("charge", row.charge.as_deref());
    let allowed = money("allowed", row.allowed.as_deref());
    let plan_paid = money("plan_paid", row.plan_paid.as_deref());
    let patient_resp = money("patient_resp", row.patient_resp.as_deref());

    let row_has_money =
        charge.is_some() || allowed.is_some() || plan_paid.is_some() || patient_resp.is_some();
    let validation = ValidatorResult {
        row_has_money,
        regex_pass,
        math_check: check_math(charge, allowed, plan_paid, patient_resp),
        issues,
    };

    let (code, code_system) = match code {
        Some((c, s)) => (Some(c), Some(s)),
        None => (None, None),
    };

    NormalizedLineItem {
        line_id: NormalizedLineItem::make_line_id(&key.artifact_id, key.page, row.row_index),
        case_id: key.case_id,
        artifact_id: key.artifact_id,
        page: key.page,
        row_index: row.row_index,
        doc_type: row.doc_type.unwrap_or(DocType::Unknown),
        code,
        code_system,
        modifiers: normalize_modifiers(&row.modifiers),
        description,
        units,
        date_of_service: dos,
        place_of_service: pos,
        rev_code,
        provider_npi: npi,
        provider_name: None,
        claim_ref: None,
        charge_cents: charge,
        allowed_cents: allowed,
        plan_paid_cents: plan_paid,
        patient_resp_cents: patient_resp,
        keyfacts: row.keyfacts.clone().filter(|k| !k.is_empty()),
        consensus: 1.0,
        low_confidence: !validation.row_has_money || !validation.regex_pass,
        validation,
        source_vendor: row.vendor.clone(),
    }
}

// ──────────────────────────────────────────────
// Page-level header and totals
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHeader {
    pub provider_name: Option<String>,
    pub provider_npi: Option<String>,
    pub payer: Option<String>,
    /// Claim id if printed, otherwise the account id.
    pub claim_ref: Option<String>,
    pub service_start: Option<NaiveDate>,
    pub service_end: Option<NaiveDate>,
}

impl From<&VendorHeader> for NormalizedHeader {
    fn from(h: &VendorHeader) -> Self {
        Self {
            provider_name: h.provider_name.as_deref().and_then(normalize_description),
            provider_npi: h.provider_npi.as_deref().and_then(normalize_npi),
            payer: h.payer.as_deref().and_then(normalize_description),
            claim_ref: h.claim_id.clone().or_else(|| h.account_id.clone()),
            service_start: h.service_dates.start.as_deref().and_then(parse_date),
            service_end: h.service_dates.end.as_deref().and_then(parse_date),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTotals {
    pub billed_cents: Option<i64>,
    pub allowed_cents: Option<i64>,
    pub plan_paid_cents: Option<i64>,
    pub patient_resp_cents: Option<i64>,
}

impl From<&VendorTotals> for NormalizedTotals {
    fn from(t: &VendorTotals) -> Self {
        Self {
            billed_cents: t.billed.as_deref().and_then(parse_money_cents),
            allowed_cents: t.allowed.as_deref().and_then(parse_money_cents),
            plan_paid_cents: t.plan_paid.as_deref().and_then(parse_money_cents),
            patient_resp_cents: t.patient_resp.as_deref().and_then(parse_money_cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::vendor::{VendorKeyFacts, VendorRow};

    fn key() -> PageKey {
        PageKey {
            case_id: Uuid::new_v4(),
            artifact_id: Uuid::new_v4(),
            page: 1,
        }
    }

    // ── money ──

    #[test]
    fn money_with_symbol_and_commas() {
        assert_eq!(parse_money_cents("$1,234.56"), Some(123456));
        assert_eq!(parse_money_cents("150"), Some(15000));
        assert_eq!(parse_money_cents("$0.00"), Some(0));
        assert_eq!(parse_money_cents(".5"), Some(50));
    }

    #[test]
    fn money_garbage_is_none_not_zero() {
        assert_eq!(parse_money_cents("N/A"), None);
        assert_eq!(parse_money_cents(""), None);
        assert_eq!(parse_money_cents("."), None);
        assert_eq!(parse_money_cents("1.2.3"), None);
    }

    #[test]
    fn money_rounds_half_up() {
        assert_eq!(parse_money_cents("10.005"), Some(1001));
        assert_eq!(parse_money_cents("10.004"), Some(1000));
        assert_eq!(parse_money_cents("0.125"), Some(13));
    }

    #[test]
    fn money_overflow_is_none() {
        assert_eq!(parse_money_cents("99999999999999999999"), None);
    }

    #[test]
    fn money_pattern_accepts_printed_forms() {
        assert!(money_matches_pattern("$1,234.56"));
        assert!(money_matches_pattern("(45.00)"));
        assert!(money_matches_pattern("  150 "));
        assert!(!money_matches_pattern("USD 12"));
        assert!(!money_matches_pattern("1,23.00"));
    }

    // ── codes ──

    #[test]
    fn codes_are_inferred_from_shape() {
        assert_eq!(normalize_code(Some("99213"), None), Some(("99213".into(), CodeSystem::Cpt)));
        assert_eq!(normalize_code(Some("g0439"), None), Some(("G0439".into(), CodeSystem::Hcpcs)));
        assert_eq!(normalize_code(Some("450"), None), Some(("450".into(), CodeSystem::Rev)));
        assert_eq!(normalize_code(Some("23"), None), Some(("23".into(), CodeSystem::Pos)));
        assert_eq!(normalize_code(Some("9921"), None), None);
        assert_eq!(normalize_code(Some("ABCDE"), None), None);
    }

    #[test]
    fn recognised_hint_is_strict() {
        assert_eq!(normalize_code(Some("99213"), Some("HCPCS")), None);
        assert_eq!(normalize_code(Some("J1100"), Some("hcpcs")), Some(("J1100".into(), CodeSystem::Hcpcs)));
        assert_eq!(normalize_code(Some("99213"), Some("ICD")), Some(("99213".into(), CodeSystem::Cpt)));
    }

    #[test]
    fn rev_and_pos_lengths_are_exact() {
        assert_eq!(normalize_rev_code("450"), Some("450".into()));
        assert_eq!(normalize_rev_code("0450"), None);
        assert_eq!(normalize_pos("23"), Some("23".into()));
        assert_eq!(normalize_pos("3"), None);
    }

    // ── other fields ──

    #[test]
    fn dates_in_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date("2024-01-15"), expected);
        assert_eq!(parse_date("01/15/2024"), expected);
        assert_eq!(parse_date("1/15/24"), expected);
        assert_eq!(parse_date("Jan 15, 2024"), expected);
        assert_eq!(parse_date("2024-01-15T08:30:00"), expected);
        assert_eq!(parse_date("02/30/2024"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn npi_requires_check_digit() {
        assert_eq!(normalize_npi("1234567893"), Some("1234567893".into()));
        assert_eq!(normalize_npi("1234567890"), None);
        assert_eq!(normalize_npi("123456789"), None);
    }

    #[test]
    fn modifiers_are_uppercased_and_deduped() {
        let raw = vec!["25".to_string(), "rt".into(), "25".into(), "XYZ".into()];
        assert_eq!(normalize_modifiers(&raw), vec!["25", "RT"]);
    }

    #[test]
    fn units_must_be_whole() {
        assert_eq!(parse_units("3"), Some(3));
        assert_eq!(parse_units("2.0"), Some(2));
        assert_eq!(parse_units("1.5"), None);
        assert_eq!(parse_units("-1"), None);
    }

    #[test]
    fn description_whitespace_collapses() {
        assert_eq!(normalize_description("  Office\n  visit  "), Some("Office visit".into()));
        assert_eq!(normalize_description("   "), None);
    }

    #[test]
    fn math_check_tolerates_a_dollar() {
        assert!(check_math(Some(20000), Some(15000), Some(12000), Some(3050)));
        assert!(!check_math(Some(20000), Some(15000), Some(12000), Some(3200)));
        assert!(!check_math(Some(10000), Some(15000), None, None));
        assert!(check_math(None, None, Some(1), None));
    }

    // ── rows ──

    #[test]
    fn keyfacts_attach_to_first_row() {
        let resp = VendorResponse {
            doc_type: Some("EOB".into()),
            rows: vec![
                VendorRow { code: Some("99213".into()), ..Default::default() },
                VendorRow { code: Some("80053".into()), ..Default::default() },
            ],
            keyfacts: VendorKeyFacts {
                carc_codes: vec!["CO-29".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let rows = rows_from_response("primary", 1, &resp);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].has_keyfacts());
        assert!(!rows[1].has_keyfacts());
        assert_eq!(rows[1].row_index, 1);
        assert_eq!(rows[0].doc_type, Some(DocType::Eob));
    }

    #[test]
    fn keyfacts_only_page_yields_synthetic_row() {
        let resp = VendorResponse {
            doc_type: Some("LETTER".into()),
            keyfacts: VendorKeyFacts {
                denial_reason: Some("No prior authorization on file".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let rows = rows_from_response("primary", 4, &resp);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_keyfacts());
        assert_eq!(rows[0].page, 4);
    }

    #[test]
    fn empty_page_yields_no_rows() {
        assert!(rows_from_response("primary", 1, &VendorResponse::default()).is_empty());
    }

    #[test]
    fn normalize_row_types_fields_and_records_issues() {
        let row = ExtractionRow {
            vendor: "primary".into(),
            page: 1,
            row_index: 0,
            doc_type: Some(DocType::Bill),
            code: Some("99213".into()),
            units: Some("1".into()),
            dos: Some("13/45/2024".into()),
            charge: Some("$150.00".into()),
            patient_resp: Some("N/A".into()),
            ..Default::default()
        };
        let item = normalize_row(&key(), &row);
        assert_eq!(item.code.as_deref(), Some("99213"));
        assert_eq!(item.code_system, Some(CodeSystem::Cpt));
        assert_eq!(item.charge_cents, Some(15000));
        assert_eq!(item.patient_resp_cents, None);
        assert_eq!(item.date_of_service, None);
        assert!(item.validation.row_has_money);
        assert!(!item.validation.regex_pass);
        assert!(item.low_confidence);
        let fields: Vec<&str> = item.validation.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["dos", "patient_resp"]);
    }

    #[test]
    fn moneyless_row_is_low_confidence() {
        let row = ExtractionRow {
            vendor: "primary".into(),
            code: Some("99213".into()),
            ..Default::default()
        };
        let item = normalize_row(&key(), &row);
        assert!(!item.validation.row_has_money);
        assert!(item.low_confidence);
    }

    #[test]
    fn header_prefers_claim_id() {
        let header = VendorHeader {
            claim_id: None,
            account_id: Some("ACC-9".into()),
            provider_npi: Some("1234567893".into()),
            ..Default::default()
        };
        let normalized = NormalizedHeader::from(&header);
        assert_eq!(normalized.claim_ref.as_deref(), Some("ACC-9"));
        assert_eq!(normalized.provider_npi.as_deref(), Some("1234567893"));
    }
}

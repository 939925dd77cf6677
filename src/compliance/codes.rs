//! Procedure and revenue code classification tables.

use std::sync::LazyLock;

use regex::Regex;

/// ICD-10 encounter-for-screening / routine exam categories.
static PREVENTIVE_DIAGNOSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bZ(?:00|01|12|13)(?:\.\w+)?\b").unwrap());

static DRUG_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^J\d{4}$").unwrap());

const PREVENTIVE_CODES: &[&str] = &[
    // Annual wellness, IPPE, screenings
    "G0101", "G0102", "G0103", "G0104", "G0105", "G0121", "G0123", "G0202", "G0296",
    "G0328", "G0442", "G0443", "G0444", "G0445", "G0446", "G0447",
    // Screening mammography and colonoscopy
    "77063", "77067", "45378", "82270",
    // Preventive counseling
    "99401", "99402", "99403", "99404", "99406", "99407",
];

const TIMED_THERAPY_CODES: &[&str] = &[
    "97110", "97112", "97113", "97116", "97140", "97530", "97533", "97535", "97542",
    "97750", "97760", "97761", "97763",
];

const GROUND_AMBULANCE_CODES: &[&str] =
    &["A0425", "A0426", "A0427", "A0428", "A0429", "A0433", "A0434"];

const OBSERVATION_CODES: &[&str] = &[
    "G0378", "G0379", "99217", "99218", "99219", "99220", "99224", "99225", "99226",
];

pub const FACILITY_FEE_CODE: &str = "G0463";

/// Comprehensive code followed by the component codes it already includes.
pub const BUNDLED_PAIRS: &[(&str, &[&str])] = &[
    ("80053", &["80048", "82947", "84132", "82565", "84295", "82040", "84155"]),
    ("80048", &["82947", "84132", "82565", "84295"]),
    ("80061", &["82465", "83718", "84478"]),
    ("85025", &["85027", "85004", "85048"]),
    ("93000", &["93005", "93010"]),
    ("45380", &["45378"]),
    ("45385", &["45378"]),
    ("43239", &["43235"]),
    ("29881", &["29877"]),
];

fn numeric(code: &str) -> Option<u32> {
    (code.len() == 5 && code.bytes().all(|b| b.is_ascii_digit()))
        .then(|| code.parse().ok())
        .flatten()
}

fn in_range(code: &str, lo: u32, hi: u32) -> bool {
    numeric(code).is_some_and(|n| (lo..=hi).contains(&n))
}

/// Evaluation and management visit codes (office, hospital, ED).
pub fn is_em_code(code: &str) -> bool {
    in_range(code, 99202, 99499)
}

pub fn is_surgical_code(code: &str) -> bool {
    in_range(code, 10004, 69990)
}

/// Anesthesia, radiology and pathology/lab: services typically rendered by
/// providers the patient did not choose.
pub fn is_ancillary_code(code: &str) -> bool {
    in_range(code, 100, 1999) || in_range(code, 70010, 79999) || in_range(code, 80047, 89398)
}

pub fn is_preventive_code(code: &str) -> bool {
    code.starts_with("G04")
        || PREVENTIVE_CODES.contains(&code)
        || in_range(code, 99381, 99387)
        || in_range(code, 99391, 99397)
}

pub fn mentions_preventive_diagnosis(text: &str) -> bool {
    PREVENTIVE_DIAGNOSIS.is_match(text)
}

pub fn is_drug_code(code: &str) -> bool {
    DRUG_CODE.is_match(code)
}

pub fn is_timed_therapy_code(code: &str) -> bool {
    TIMED_THERAPY_CODES.contains(&code)
}

pub fn is_ground_ambulance_code(code: &str) -> bool {
    GROUND_AMBULANCE_CODES.contains(&code)
}

pub fn is_observation_code(code: &str) -> bool {
    OBSERVATION_CODES.contains(&code)
}

/// Revenue codes 045x (emergency room).
pub fn is_er_rev_code(rev: &str) -> bool {
    rev.len() == 3 && rev.starts_with("45")
}

/// Revenue codes 051x (clinic).
pub fn is_clinic_rev_code(rev: &str) -> bool {
    rev.len() == 3 && rev.starts_with("51")
}

pub fn is_observation_rev_code(rev: &str) -> bool {
    rev == "762"
}

pub const EMERGENCY_POS: &str = "23";
pub const HOSPITAL_OUTPATIENT_POS: &[&str] = &["19", "22"];

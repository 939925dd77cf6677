use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocType {
    Eob => "EOB",
    Bill => "BILL",
    Letter => "LETTER",
    Portal => "PORTAL",
    InsuranceCard => "INSURANCE_CARD",
    Unknown => "UNKNOWN",
});

impl DocType {
    /// Vendor classifications are free text; anything unrecognised is `Unknown`.
    pub fn from_vendor(raw: Option<&str>) -> Self {
        raw.map(|s| s.trim().to_ascii_uppercase())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Unknown)
    }
}

str_enum!(CodeSystem {
    Cpt => "CPT",
    Hcpcs => "HCPCS",
    Rev => "REV",
    Pos => "POS",
});

str_enum!(Authority {
    Federal => "Federal",
    Cms => "CMS",
    StateDoi => "StateDOI",
    PayerPolicy => "PayerPolicy",
});

impl Authority {
    /// Precedence of the issuing authority when sources disagree.
    pub fn rank(&self) -> f32 {
        match self {
            Self::Federal => 1.0,
            Self::Cms => 0.90,
            Self::StateDoi => 0.87,
            Self::PayerPolicy => 0.78,
        }
    }
}

str_enum!(DetectionCategory {
    Duplicate => "Duplicate",
    Unbundling => "Unbundling",
    GlobalSurgeryModifier25 => "GlobalSurgeryModifier25",
    Preventive => "Preventive",
    NsaEmergency => "NSA_ER",
    NsaAncillary => "NSA_Ancillary",
    FacilityFee => "FacilityFee",
    GroundAmbulance => "GroundAmbulance",
    HighDrugUnits => "HighDrugUnits",
    TherapyUnits => "TherapyUnits",
    TimelyFiling => "TimelyFiling",
    CoordinationOfBenefits => "COB",
    EobZeroStillBilled => "EOBZeroStillBilled",
    BalanceBilling => "BalanceBilling",
    MissingItemization => "MissingItemization",
    MathError => "MathError",
    ObservationStatus => "ObservationStatus",
    PriorAuthorization => "PriorAuthorization",
});

str_enum!(NetworkStatus {
    InNetwork => "in_network",
    OutOfNetwork => "out_of_network",
    Unknown => "unknown",
});

str_enum!(PlanType {
    Hmo => "hmo",
    Ppo => "ppo",
    Epo => "epo",
    Pos => "pos",
    Hdhp => "hdhp",
    Medicare => "medicare",
    Medicaid => "medicaid",
    Other => "other",
});

str_enum!(FacilityType {
    EmergencyDepartment => "emergency_department",
    FreestandingEr => "freestanding_er",
    HospitalInpatient => "hospital_inpatient",
    HospitalOutpatient => "hospital_outpatient",
    AmbulatorySurgeryCenter => "ambulatory_surgery_center",
    PhysicianOffice => "physician_office",
    UrgentCare => "urgent_care",
    Other => "other",
});

impl FacilityType {
    pub fn is_hospital(&self) -> bool {
        matches!(
            self,
            Self::EmergencyDepartment
                | Self::FreestandingEr
                | Self::HospitalInpatient
                | Self::HospitalOutpatient
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn doc_type_round_trips_through_str() {
        for t in [
            DocType::Eob,
            DocType::Bill,
            DocType::Letter,
            DocType::Portal,
            DocType::InsuranceCard,
            DocType::Unknown,
        ] {
            assert_eq!(DocType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn doc_type_from_vendor_is_lenient() {
        assert_eq!(DocType::from_vendor(Some(" eob ")), DocType::Eob);
        assert_eq!(DocType::from_vendor(Some("receipt")), DocType::Unknown);
        assert_eq!(DocType::from_vendor(None), DocType::Unknown);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = NetworkStatus::from_str("sideways").unwrap_err();
        assert!(err.to_string().contains("NetworkStatus"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&DetectionCategory::NsaEmergency).unwrap();
        assert_eq!(json, "\"NSA_ER\"");
        let parsed: DocType = serde_json::from_str("\"INSURANCE_CARD\"").unwrap();
        assert_eq!(parsed, DocType::InsuranceCard);
    }

    #[test]
    fn authority_ranking_orders_federal_first() {
        assert!(Authority::Federal.rank() > Authority::Cms.rank());
        assert!(Authority::Cms.rank() > Authority::StateDoi.rank());
        assert!(Authority::StateDoi.rank() > Authority::PayerPolicy.rank());
    }
}

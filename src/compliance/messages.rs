use crate::models::enums::DetectionCategory;

/// Format integer cents as dollars for display.
pub fn dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Explanation templates. Phrased as observations for the patient to
/// verify, never as conclusions.
pub struct MessageTemplates;

impl MessageTemplates {
    pub fn duplicate(label: &str, date: &str, charge_cents: i64, count: usize) -> String {
        format!(
            "{label} appears {count} times on {date}, each charged {}. \
             The same service on the same day for the same amount is often a duplicate charge.",
            dollars(charge_cents),
        )
    }

    pub fn unbundling(comprehensive: &str, component: &str, date: &str) -> String {
        format!(
            "{comprehensive} and {component} were both billed on {date}. \
             {component} is normally included in {comprehensive} and should not be charged separately.",
        )
    }

    pub fn modifier_25(em_label: &str, surgical_label: &str) -> String {
        format!(
            "An office or hospital visit ({em_label}) was billed on the same claim as a procedure \
             ({surgical_label}) without modifier 25. Visits tied to a procedure are usually part of its global fee.",
        )
    }

    pub fn preventive(label: &str, patient_resp_cents: i64) -> String {
        format!(
            "{label} looks like preventive care, but you were charged {}. \
             Most plans must cover preventive services without cost sharing.",
            dollars(patient_resp_cents),
        )
    }

    pub fn nsa_emergency(total_cents: i64) -> String {
        format!(
            "This emergency visit included services from providers you likely did not choose, \
             and your share totals {}. Under the No Surprises Act you should owe no more than \
             your in-network cost sharing for emergency care.",
            dollars(total_cents),
        )
    }

    pub fn nsa_ancillary(vendors: &str) -> String {
        format!(
            "You were treated at an in-network facility and ancillary services ({vendors}) were billed. \
             Ancillary providers at in-network facilities cannot balance bill you.",
        )
    }

    pub fn facility_fee(label: &str) -> String {
        format!(
            "{label} is a hospital facility fee for an outpatient visit. \
             Check whether you were told the clinic is billed as a hospital department.",
        )
    }

    pub fn ground_ambulance(label: &str) -> String {
        format!(
            "{label} is a ground ambulance service from an out-of-network provider. \
             Federal surprise billing protections do not cover ground ambulances, but many states do.",
        )
    }

    pub fn high_drug_units(label: &str, units: u32) -> String {
        format!(
            "{label} was billed for {units} units, which is unusually high for a single line. \
             Units may have been entered in the wrong measure.",
        )
    }

    pub fn therapy_units(label: &str, units: u32) -> String {
        format!(
            "{label} was billed for {units} units, about {} minutes of one timed therapy in a day.",
            u64::from(units) * 15,
        )
    }

    pub fn timely_filing() -> String {
        "The claim appears to have been denied for late filing. \
         A provider who files late generally cannot bill you for the denied amount."
            .to_string()
    }

    pub fn coordination_of_benefits() -> String {
        "The claim involves coordination of benefits with another plan. \
         Confirm both plans have current information on which one pays first."
            .to_string()
    }

    pub fn eob_zero_still_billed(bill_cents: i64) -> String {
        format!(
            "Your explanation of benefits shows you owe $0.00, but the bill asks you to pay {}.",
            dollars(bill_cents),
        )
    }

    pub fn balance_billing(bill_cents: i64, eob_cents: i64) -> String {
        format!(
            "The bill asks for {} but your explanation of benefits says you owe {}. \
             In-network providers agree to accept the plan's allowed amount.",
            dollars(bill_cents),
            dollars(eob_cents),
        )
    }

    pub fn balance_billing_narrative() -> String {
        "You describe being billed for the difference between the charge and what your plan allowed. \
         In-network providers generally cannot balance bill."
            .to_string()
    }

    pub fn missing_itemization() -> String {
        "You asked for an itemized bill, but the documents provided contain no coded line items."
            .to_string()
    }

    pub fn math_error(label: &str) -> String {
        format!(
            "The amounts on {label} do not add up: the allowed amount, plan payment and \
             your share are inconsistent with each other or with the charge.",
        )
    }

    pub fn observation_status() -> String {
        "Part of this stay appears to have been billed as outpatient observation rather than \
         an inpatient admission, which can change what you owe."
            .to_string()
    }

    pub fn prior_authorization(reason: Option<&str>) -> String {
        match reason {
            Some(r) => format!(
                "The claim was denied for missing authorization or referral (\"{r}\"). \
                 Ask whether the provider was responsible for obtaining it."
            ),
            None => "The claim was denied for missing authorization or referral. \
                     Ask whether the provider was responsible for obtaining it."
                .to_string(),
        }
    }
}

/// Questions the patient can take to the provider or plan.
pub fn follow_up_questions(category: DetectionCategory) -> Vec<String> {
    use DetectionCategory as C;

    let questions: &[&str] = match category {
        C::Duplicate => &[
            "Can you confirm this service was performed more than once that day?",
            "If not, will you remove the duplicate charge and send a corrected bill?",
        ],
        C::Unbundling => &[
            "Why were these codes billed separately instead of as one comprehensive service?",
            "Does this pass the NCCI procedure-to-procedure edits?",
        ],
        C::GlobalSurgeryModifier25 => &[
            "Was the visit a separate, significant service from the procedure?",
            "Is the visit included in the procedure's global surgery package?",
        ],
        C::Preventive => &[
            "Was this visit coded as preventive or diagnostic, and why?",
            "Can the claim be reprocessed as preventive care with no cost sharing?",
        ],
        C::NsaEmergency => &[
            "Was my cost sharing calculated at the in-network rate as the No Surprises Act requires?",
            "Which providers on this claim were out of network?",
        ],
        C::NsaAncillary => &[
            "Were the anesthesia, radiology or lab providers out of network?",
            "Was I asked to sign a notice and consent waiver, and is it valid for ancillary services?",
        ],
        C::FacilityFee => &[
            "Is this clinic billed as a hospital outpatient department?",
            "Was I told in advance that a facility fee would apply?",
        ],
        C::GroundAmbulance => &[
            "Does my state protect patients from ground ambulance balance billing?",
            "What amount did my plan allow for this transport?",
        ],
        C::HighDrugUnits => &[
            "What dose was actually administered, and how many billing units does that equal?",
            "Does the unit count include discarded drug?",
        ],
        C::TherapyUnits => &[
            "How many minutes of each therapy were actually provided?",
            "Do the units follow the 8-minute rule?",
        ],
        C::TimelyFiling => &[
            "When was the claim first submitted to my plan?",
            "Will you write off the amount denied for late filing?",
        ],
        C::CoordinationOfBenefits => &[
            "Which plan is primary for this claim?",
            "Has the secondary plan received the primary plan's explanation of benefits?",
        ],
        C::EobZeroStillBilled => &[
            "Why does the bill show an amount due when my plan says I owe nothing?",
            "Has the payment from my plan been posted to my account?",
        ],
        C::BalanceBilling => &[
            "Are you in network with my plan for this date of service?",
            "Why am I being billed more than the patient responsibility on my explanation of benefits?",
        ],
        C::MissingItemization => &[
            "Please send an itemized bill with CPT/HCPCS codes, dates and charges for each service.",
        ],
        C::MathError => &[
            "Can you explain how the allowed amount, plan payment and my share were calculated?",
        ],
        C::ObservationStatus => &[
            "Was I formally admitted as an inpatient, or kept under observation?",
            "Did I receive a written notice that I was an outpatient under observation?",
        ],
        C::PriorAuthorization => &[
            "Who was responsible for obtaining prior authorization or a referral?",
            "Can authorization be requested retroactively?",
        ],
    };
    questions.iter().map(|q| q.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollars_formats_cents() {
        assert_eq!(dollars(123456), "$1234.56");
        assert_eq!(dollars(5), "$0.05");
        assert_eq!(dollars(-2500), "-$25.00");
    }

    #[test]
    fn duplicate_message_names_amount() {
        let msg = MessageTemplates::duplicate("99213 (Office visit)", "2024-01-15", 15000, 2);
        assert!(msg.contains("2 times"));
        assert!(msg.contains("$150.00"));
    }

    #[test]
    fn every_category_has_follow_ups() {
        assert!(!follow_up_questions(DetectionCategory::MathError).is_empty());
        assert_eq!(follow_up_questions(DetectionCategory::Duplicate).len(), 2);
    }
}

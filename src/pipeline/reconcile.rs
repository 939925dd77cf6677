//! Consensus reconciliation of two vendors' transcriptions of one page.
//!
//! The primary vendor's values are always the ones stored. The secondary
//! vendor only informs each row's consensus score.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::normalize::{normalize_row, rows_from_response, NormalizedHeader, NormalizedTotals, PageKey};
use super::vendor::VendorResponse;
use crate::models::enums::DocType;
use crate::models::{KeyFacts, NormalizedLineItem};

/// A successful vendor response, tagged with the vendor that produced it.
#[derive(Debug, Clone)]
pub struct VendorPage {
    pub vendor: String,
    pub response: VendorResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTypeDisagreement {
    pub primary: DocType,
    pub secondary: DocType,
}

/// Everything extracted from one page after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPage {
    pub key: PageKey,
    pub doc_type: DocType,
    pub doc_type_disagreement: Option<DocTypeDisagreement>,
    pub header: NormalizedHeader,
    pub totals: NormalizedTotals,
    pub keyfacts: Option<KeyFacts>,
    pub items: Vec<NormalizedLineItem>,
    /// Vendors whose responses contributed, primary first.
    pub vendors: Vec<String>,
    /// Rows discarded for carrying neither money nor keyfacts.
    pub dropped_rows: usize,
}

/// Fraction of the compared fields on which both vendors agree.
///
/// Compared fields are code, description, charge and date of service; a
/// field counts when either vendor supplied it. With nothing to compare the
/// score is 0.0.
pub fn field_agreement(primary: &NormalizedLineItem, secondary: Option<&NormalizedLineItem>) -> f64 {
    fn tally<T: PartialEq>(a: Option<T>, b: Option<T>) -> (u32, u32) {
        match (a, b) {
            (None, None) => (0, 0),
            (Some(x), Some(y)) if x == y => (1, 1),
            _ => (0, 1),
        }
    }

    let fields = [
        tally(primary.code.as_ref(), secondary.and_then(|s| s.code.as_ref())),
        tally(primary.description.as_ref(), secondary.and_then(|s| s.description.as_ref())),
        tally(primary.charge_cents, secondary.and_then(|s| s.charge_cents)),
        tally(primary.date_of_service, secondary.and_then(|s| s.date_of_service)),
    ];

    let (agree, present) = fields
        .iter()
        .fold((0, 0), |(a, p), (fa, fp)| (a + fa, p + fp));
    if present == 0 {
        0.0
    } else {
        f64::from(agree) / f64::from(present)
    }
}

/// Reconcile whatever vendors succeeded for one page.
///
/// Returns `None` only when neither vendor produced a response.
pub fn reconcile_page(
    key: &PageKey,
    primary: Option<&VendorPage>,
    secondary: Option<&VendorPage>,
) -> Option<NormalizedPage> {
    let (base, other) = match (primary, secondary) {
        (Some(p), s) => (p, s),
        (None, Some(s)) => (s, None),
        (None, None) => return None,
    };

    let doc_type = DocType::from_vendor(base.response.doc_type.as_deref());
    let doc_type_disagreement = other.and_then(|o| {
        let secondary = DocType::from_vendor(o.response.doc_type.as_deref());
        (secondary != doc_type).then_some(DocTypeDisagreement {
            primary: doc_type,
            secondary,
        })
    });
    if let Some(d) = &doc_type_disagreement {
        tracing::warn!(
            page = key.page,
            primary = d.primary.as_str(),
            secondary = d.secondary.as_str(),
            "Vendors disagree on document type; keeping primary"
        );
    }

    let header = NormalizedHeader::from(&base.response.header);
    let totals = NormalizedTotals::from(&base.response.totals);
    let keyfacts = Some(KeyFacts::from(base.response.keyfacts.clone())).filter(|k| !k.is_empty());

    let secondary_items: HashMap<usize, NormalizedLineItem> = other
        .map(|o| {
            rows_from_response(&o.vendor, key.page, &o.response)
                .iter()
                .map(|r| (r.row_index, normalize_row(key, r)))
                .collect()
        })
        .unwrap_or_default();

    let mut items = Vec::new();
    let mut dropped_rows = 0;
    for row in rows_from_response(&base.vendor, key.page, &base.response) {
        let mut item = normalize_row(key, &row);

        if !item.validation.row_has_money && item.keyfacts.is_none() {
            dropped_rows += 1;
            continue;
        }

        if other.is_some() {
            item.consensus = field_agreement(&item, secondary_items.get(&row.row_index));
        }
        item.provider_name = header.provider_name.clone();
        item.claim_ref = header.claim_ref.clone();
        if item.provider_npi.is_none() {
            item.provider_npi = header.provider_npi.clone();
        }
        items.push(item);
    }

    let mut vendors = vec![base.vendor.clone()];
    vendors.extend(other.map(|o| o.vendor.clone()));

    tracing::debug!(
        page = key.page,
        rows = items.len(),
        dropped = dropped_rows,
        vendors = vendors.len(),
        "Page reconciled"
    );

    Some(NormalizedPage {
        key: *key,
        doc_type,
        doc_type_disagreement,
        header,
        totals,
        keyfacts,
        items,
        vendors,
        dropped_rows,
    })
}

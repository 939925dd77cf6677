use std::collections::HashMap;
use std::time::Instant;

use crate::models::{CaseContext, NormalizedLineItem};

use super::detection::default_catalog;
use super::types::{ComplianceResult, Detection, Detector};

/// Runs every detector in the catalog over a case's line items.
/// Detectors are evaluated unconditionally and their results concatenated.
pub struct ComplianceEngine {
    detectors: Vec<Box<dyn Detector>>,
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceEngine {
    pub fn new() -> Self {
        Self::with_detectors(default_catalog())
    }

    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn detectors(&self) -> &[Box<dyn Detector>] {
        &self.detectors
    }

    pub fn analyze(&self, items: &[NormalizedLineItem], ctx: &CaseContext) -> ComplianceResult {
        let start = Instant::now();

        let detections: Vec<Detection> = self
            .detectors
            .iter()
            .flat_map(|d| d.detect(items, ctx))
            .collect();

        let mut counts = HashMap::new();
        for d in &detections {
            *counts.entry(d.category).or_insert(0) += 1;
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            case_id = %ctx.case_id,
            line_items = items.len(),
            detectors = self.detectors.len(),
            total = detections.len(),
            processing_ms = processing_time_ms,
            "Compliance analysis complete"
        );

        ComplianceResult {
            detections,
            counts,
            processing_time_ms,
        }
    }
}

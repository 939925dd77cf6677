use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

use crate::compliance::{CitationCompiler, ComplianceEngine, Detection, PolicyCitation};
use crate::config::{
    PipelineConfig, VendorApi, VendorConfig, DEFAULT_PAGE_CONCURRENCY,
    DEFAULT_VENDOR_TIMEOUT_SECS,
};
use crate::db::{DatabaseError, ExtractionStore};
use crate::models::enums::DetectionCategory;
use crate::models::{CaseContext, NormalizedLineItem};

use super::normalize::PageKey;
use super::reconcile::{reconcile_page, NormalizedPage, VendorPage};
use super::vendor::{
    ChatCompletionsAdapter, ExtractionRequest, MessagesAdapter, VendorAdapter, VendorError,
};
use super::PipelineError;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One rendered page of a source document.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub buffer: Vec<u8>,
    pub mime_type: String,
}

/// A source document (one artifact) split into pages.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub name: String,
    pub pages: Vec<PageImage>,
    pub doc_type_hint: Option<String>,
}

impl DocumentInput {
    /// A single-page document, or a PDF sent to the vendors whole.
    pub fn single(name: &str, buffer: Vec<u8>, mime_type: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: vec![PageImage {
                buffer,
                mime_type: mime_type.to_string(),
            }],
            doc_type_hint: None,
        }
    }

    pub fn with_doc_type_hint(mut self, hint: &str) -> Self {
        self.doc_type_hint = Some(hint.to_string());
        self
    }

    /// SHA-256 over every page buffer in order, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for page in &self.pages {
            hasher.update(&page.buffer);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Content-derived artifact id: re-submitting the same document maps
    /// onto the same stored rows.
    pub fn artifact_id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.digest().as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A page neither vendor could read.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub artifact_id: Uuid,
    pub page: u32,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<VendorError>,
}

fn serialize_errors<S: Serializer>(errors: &[VendorError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(|e| e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Saved,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Documents were read and nothing was flagged.
    Clean,
    Findings,
    /// Analysis finished but the results were not stored.
    PersistenceFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub case_id: Uuid,
    pub pages: Vec<NormalizedPage>,
    pub line_items: Vec<NormalizedLineItem>,
    pub detections: Vec<Detection>,
    pub counts: std::collections::HashMap<DetectionCategory, usize>,
    pub citations: Vec<PolicyCitation>,
    pub page_failures: Vec<PageFailure>,
    pub persistence: PersistenceStatus,
    pub processing_time_ms: u64,
}

impl AnalysisReport {
    pub fn status(&self) -> RunStatus {
        if matches!(self.persistence, PersistenceStatus::Failed(_)) {
            RunStatus::PersistenceFailed
        } else if self.detections.is_empty() {
            RunStatus::Clean
        } else {
            RunStatus::Findings
        }
    }
}

/// Pages of one document, in page order, and the pages that failed.
#[derive(Debug, Default)]
pub struct DocumentExtraction {
    pub pages: Vec<NormalizedPage>,
    pub failures: Vec<PageFailure>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs every page through both vendors, reconciles, then hands the fused
/// line items to the compliance engine.
pub struct ExtractionPipeline {
    primary: Arc<dyn VendorAdapter>,
    secondary: Arc<dyn VendorAdapter>,
    vendor_timeout: Duration,
    page_concurrency: usize,
    engine: ComplianceEngine,
}

impl ExtractionPipeline {
    pub fn new(primary: Arc<dyn VendorAdapter>, secondary: Arc<dyn VendorAdapter>) -> Self {
        Self {
            primary,
            secondary,
            vendor_timeout: Duration::from_secs(DEFAULT_VENDOR_TIMEOUT_SECS),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            engine: ComplianceEngine::new(),
        }
    }

    pub fn with_vendor_timeout(mut self, timeout: Duration) -> Self {
        self.vendor_timeout = timeout;
        self
    }

    pub fn with_page_concurrency(mut self, concurrency: usize) -> Self {
        self.page_concurrency = concurrency.max(1);
        self
    }

    pub fn with_engine(mut self, engine: ComplianceEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Build both HTTP adapters from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let primary = build_adapter(&config.primary, config.vendor_timeout_secs)?;
        let secondary = build_adapter(&config.secondary, config.vendor_timeout_secs)?;

        tracing::info!(
            primary = %config.primary.name,
            primary_model = %config.primary.model,
            secondary = %config.secondary.name,
            secondary_model = %config.secondary.model,
            timeout_secs = config.vendor_timeout_secs,
            page_concurrency = config.page_concurrency,
            "Extraction pipeline configured"
        );

        Ok(Self::new(primary, secondary)
            .with_vendor_timeout(Duration::from_secs(config.vendor_timeout_secs))
            .with_page_concurrency(config.page_concurrency))
    }

    /// One vendor call under the pipeline's deadline.
    async fn call_vendor(
        &self,
        vendor: &Arc<dyn VendorAdapter>,
        request: &ExtractionRequest,
    ) -> Result<VendorPage, VendorError> {
        let name = vendor.name().to_string();
        let span = tracing::info_span!("vendor_call", vendor = %name, page = request.page_number);

        async {
            let start = Instant::now();
            let result = match tokio::time::timeout(self.vendor_timeout, vendor.extract(request)).await
            {
                Ok(inner) => inner,
                Err(_) => Err(VendorError::Timeout {
                    vendor: name.clone(),
                    secs: self.vendor_timeout.as_secs(),
                }),
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    tracing::debug!(elapsed_ms, rows = response.rows.len(), "Vendor responded");
                    Ok(VendorPage {
                        vendor: name.clone(),
                        response,
                    })
                }
                Err(e) => {
                    tracing::warn!(elapsed_ms, error = %e, "Vendor call failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Both vendors on one page, concurrently. Waits for both to settle.
    pub async fn extract_page(
        &self,
        key: PageKey,
        request: &ExtractionRequest,
    ) -> Result<NormalizedPage, PageFailure> {
        let (primary, secondary) = tokio::join!(
            self.call_vendor(&self.primary, request),
            self.call_vendor(&self.secondary, request),
        );

        let mut errors = Vec::new();
        let mut settle = |result: Result<VendorPage, VendorError>| match result {
            Ok(page) => Some(page),
            Err(e) => {
                errors.push(e);
                None
            }
        };
        let primary = settle(primary);
        let secondary = settle(secondary);

        reconcile_page(&key, primary.as_ref(), secondary.as_ref()).ok_or(PageFailure {
            artifact_id: key.artifact_id,
            page: key.page,
            errors,
        })
    }

    /// Every page of one document through a bounded pool, returned in page
    /// order regardless of completion order.
    pub async fn extract_document(&self, case_id: Uuid, doc: &DocumentInput) -> DocumentExtraction {
        let digest = doc.digest();
        let artifact_id = doc.artifact_id();

        let jobs = doc.pages.iter().enumerate().map(|(i, image)| {
            let page = i as u32 + 1;
            let key = PageKey {
                case_id,
                artifact_id,
                page,
            };
            let request = ExtractionRequest {
                buffer: image.buffer.clone(),
                mime_type: image.mime_type.clone(),
                page_number: page,
                document_digest: digest.clone(),
                doc_type_hint: doc.doc_type_hint.clone(),
            };
            async move { (page, self.extract_page(key, &request).await) }
        });

        let mut results: Vec<(u32, Result<NormalizedPage, PageFailure>)> = stream::iter(jobs)
            .buffer_unordered(self.page_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(page, _)| *page);

        let mut out = DocumentExtraction::default();
        for (_, result) in results {
            match result {
                Ok(page) => out.pages.push(page),
                Err(failure) => out.failures.push(failure),
            }
        }

        tracing::info!(
            document = %doc.name,
            artifact_id = %artifact_id,
            pages = out.pages.len(),
            failed = out.failures.len(),
            "Document extracted"
        );
        out
    }

    /// Extract every document, run the compliance engine over the fused
    /// line items and, if a store is given, persist both.
    ///
    /// Fails only when nothing could be read at all, so a clean report
    /// always means documents were read and nothing was flagged.
    pub async fn analyze_case(
        &self,
        documents: &[DocumentInput],
        ctx: &CaseContext,
        store: Option<&dyn ExtractionStore>,
    ) -> Result<AnalysisReport, PipelineError> {
        let start = Instant::now();

        if documents.is_empty() {
            return Err(PipelineError::NoDocuments);
        }
        if let Some(doc) = documents.iter().find(|d| d.pages.is_empty()) {
            return Err(PipelineError::EmptyDocument(doc.name.clone()));
        }

        let mut seen = HashSet::new();
        let mut pages = Vec::new();
        let mut page_failures = Vec::new();
        for doc in documents {
            if !seen.insert(doc.artifact_id()) {
                tracing::warn!(
                    document = %doc.name,
                    artifact_id = %doc.artifact_id(),
                    "Skipping document with the same content as an earlier one"
                );
                continue;
            }
            let extraction = self.extract_document(ctx.case_id, doc).await;
            pages.extend(extraction.pages);
            page_failures.extend(extraction.failures);
        }

        if pages.is_empty() {
            tracing::error!(
                case_id = %ctx.case_id,
                failures = page_failures.len(),
                "No page could be extracted"
            );
            return Err(PipelineError::AllPagesFailed {
                failures: page_failures,
            });
        }

        let line_items: Vec<NormalizedLineItem> =
            pages.iter().flat_map(|p| p.items.iter().cloned()).collect();
        let compliance = self.engine.analyze(&line_items, ctx);
        let citations = CitationCompiler::compile(&compliance.detections);

        let persistence = match store {
            None => PersistenceStatus::Skipped,
            Some(store) => match persist(store, ctx, &line_items, &compliance.detections) {
                Ok(()) => PersistenceStatus::Saved,
                Err(e) => {
                    tracing::warn!(
                        case_id = %ctx.case_id,
                        error = %e,
                        "Failed to persist analysis, returning results anyway"
                    );
                    PersistenceStatus::Failed(e.to_string())
                }
            },
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            case_id = %ctx.case_id,
            pages = pages.len(),
            page_failures = page_failures.len(),
            line_items = line_items.len(),
            detections = compliance.detections.len(),
            processing_ms = processing_time_ms,
            "Case analysis complete"
        );

        Ok(AnalysisReport {
            case_id: ctx.case_id,
            pages,
            line_items,
            detections: compliance.detections,
            counts: compliance.counts,
            citations,
            page_failures,
            persistence,
            processing_time_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_adapter(
    config: &VendorConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn VendorAdapter>, VendorError> {
    let adapter: Arc<dyn VendorAdapter> = match config.api {
        VendorApi::ChatCompletions => Arc::new(ChatCompletionsAdapter::new(
            &config.name,
            &config.base_url,
            &config.api_key,
            &config.model,
            timeout_secs,
        )?),
        VendorApi::Messages => Arc::new(MessagesAdapter::new(
            &config.name,
            &config.base_url,
            &config.api_key,
            &config.model,
            timeout_secs,
        )?),
    };
    Ok(adapter)
}

fn persist(
    store: &dyn ExtractionStore,
    ctx: &CaseContext,
    line_items: &[NormalizedLineItem],
    detections: &[Detection],
) -> Result<(), DatabaseError> {
    store.save_line_items(line_items)?;
    store.save_detections(&ctx.case_id, detections)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteExtractionStore;
    use crate::models::enums::DocType;
    use crate::pipeline::vendor::{MockVendor, VendorResponse, VendorRow};

    fn row(code: &str, charge: &str) -> VendorRow {
        VendorRow {
            code: Some(code.into()),
            description: Some("Office visit".into()),
            units: Some("1".into()),
            dos: Some("01/15/2024".into()),
            charge: Some(charge.into()),
            ..Default::default()
        }
    }

    fn bill(rows: Vec<VendorRow>) -> VendorResponse {
        VendorResponse {
            doc_type: Some("BILL".into()),
            rows,
            ..Default::default()
        }
    }

    fn clean_bill() -> VendorResponse {
        bill(vec![row("99213", "$150.00"), row("85025", "$32.00")])
    }

    fn transport(vendor: &str) -> VendorError {
        VendorError::Transport {
            vendor: vendor.into(),
            reason: "connection refused".into(),
        }
    }

    fn pipeline(primary: MockVendor, secondary: MockVendor) -> ExtractionPipeline {
        ExtractionPipeline::new(Arc::new(primary), Arc::new(secondary))
    }

    fn document(pages: usize) -> DocumentInput {
        DocumentInput {
            name: "bill.png".into(),
            pages: (0..pages)
                .map(|i| PageImage {
                    buffer: vec![i as u8; 8],
                    mime_type: "image/png".into(),
                })
                .collect(),
            doc_type_hint: None,
        }
    }

    fn ctx() -> CaseContext {
        CaseContext::new(Uuid::from_u128(0xCA5E))
    }

    #[tokio::test]
    async fn agreeing_vendors_produce_full_consensus() {
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::new("secondary", clean_bill()),
        );
        let report = p.analyze_case(&[document(1)], &ctx(), None).await.unwrap();

        assert_eq!(report.line_items.len(), 2);
        assert!(report.line_items.iter().all(|i| i.consensus == 1.0));
        assert_eq!(report.pages[0].vendors, vec!["primary", "secondary"]);
        assert!(report.page_failures.is_empty());
        assert_eq!(report.persistence, PersistenceStatus::Skipped);
        assert_eq!(report.status(), RunStatus::Clean);
        assert_eq!(report.citations.len(), 2);
    }

    #[tokio::test]
    async fn secondary_failure_falls_back_to_primary() {
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::failing("secondary", transport("secondary")),
        );
        let report = p.analyze_case(&[document(1)], &ctx(), None).await.unwrap();

        assert_eq!(report.line_items.len(), 2);
        assert!(report.line_items.iter().all(|i| i.consensus == 1.0));
        assert_eq!(report.pages[0].vendors, vec!["primary"]);
        assert!(report.page_failures.is_empty());
    }

    #[tokio::test]
    async fn slow_vendor_times_out_and_other_survives() {
        let primary = MockVendor::new("primary", clean_bill()).with_delay(Duration::from_secs(5));
        let secondary = MockVendor::new("secondary", clean_bill());
        let p = pipeline(primary, secondary).with_vendor_timeout(Duration::from_millis(50));

        let doc = document(1);
        let key = PageKey {
            case_id: ctx().case_id,
            artifact_id: doc.artifact_id(),
            page: 1,
        };
        let request = ExtractionRequest {
            buffer: doc.pages[0].buffer.clone(),
            mime_type: "image/png".into(),
            page_number: 1,
            document_digest: doc.digest(),
            doc_type_hint: None,
        };
        let page = p.extract_page(key, &request).await.unwrap();

        assert_eq!(page.vendors, vec!["secondary"]);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|i| i.source_vendor == "secondary"));
    }

    #[tokio::test]
    async fn page_failing_on_both_vendors_is_reported() {
        let primary = MockVendor::new("primary", clean_bill()).with_page(2, Err(transport("primary")));
        let secondary =
            MockVendor::new("secondary", clean_bill()).with_page(2, Err(transport("secondary")));
        let p = pipeline(primary, secondary);

        let report = p.analyze_case(&[document(3)], &ctx(), None).await.unwrap();

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.page_failures.len(), 1);
        assert_eq!(report.page_failures[0].page, 2);
        assert_eq!(report.page_failures[0].errors.len(), 2);
    }

    #[tokio::test]
    async fn pages_come_back_in_page_order() {
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::new("secondary", clean_bill()),
        )
        .with_page_concurrency(4);

        let extraction = p.extract_document(ctx().case_id, &document(6)).await;
        let order: Vec<u32> = extraction.pages.iter().map(|p| p.key.page).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn every_page_failing_is_an_error_not_a_clean_report() {
        let p = pipeline(
            MockVendor::failing("primary", transport("primary")),
            MockVendor::failing("secondary", transport("secondary")),
        );
        let err = p.analyze_case(&[document(2)], &ctx(), None).await.unwrap_err();
        let PipelineError::AllPagesFailed { failures } = &err else {
            panic!("expected AllPagesFailed, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .flat_map(|f| &f.errors)
            .all(|e| matches!(e, VendorError::Transport { .. })));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn total_failure_keeps_each_vendor_cause() {
        let timeout = VendorError::Timeout {
            vendor: "primary".into(),
            secs: 60,
        };
        let rejected = VendorError::Status {
            vendor: "secondary".into(),
            status: 401,
            body: "invalid api key".into(),
        };
        let p = pipeline(
            MockVendor::failing("primary", timeout),
            MockVendor::failing("secondary", rejected),
        );

        let err = p.analyze_case(&[document(1)], &ctx(), None).await.unwrap_err();
        let PipelineError::AllPagesFailed { failures } = err else {
            panic!("expected AllPagesFailed");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].page, 1);
        let errors = &failures[0].errors;
        assert!(errors.iter().any(|e| matches!(e, VendorError::Timeout { vendor, .. } if vendor == "primary")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VendorError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn same_file_twice_is_analyzed_once() {
        let store = SqliteExtractionStore::in_memory().unwrap();
        let visit = bill(vec![row("99213", "$150.00")]);
        let primary = Arc::new(MockVendor::new("primary", visit.clone()));
        let p = ExtractionPipeline::new(
            primary.clone(),
            Arc::new(MockVendor::new("secondary", visit)),
        );

        let doc = document(1);
        let report = p
            .analyze_case(&[doc.clone(), doc], &ctx(), Some(&store))
            .await
            .unwrap();

        assert_eq!(primary.call_count(), 1);
        assert_eq!(report.line_items.len(), 1);
        assert_eq!(report.counts.get(&DetectionCategory::Duplicate), None);
        assert_eq!(report.status(), RunStatus::Clean);
        assert_eq!(store.load_line_items(&ctx().case_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rerun_with_fewer_rows_replaces_stored_rows() {
        let store = SqliteExtractionStore::in_memory().unwrap();
        let three = bill(vec![
            row("99213", "$150.00"),
            row("85025", "$32.00"),
            row("80053", "$48.00"),
        ]);
        let first = pipeline(
            MockVendor::new("primary", three.clone()),
            MockVendor::new("secondary", three),
        );
        first
            .analyze_case(&[document(1)], &ctx(), Some(&store))
            .await
            .unwrap();

        let one = bill(vec![row("99213", "$150.00")]);
        let second = pipeline(
            MockVendor::new("primary", one.clone()),
            MockVendor::new("secondary", one),
        );
        let report = second
            .analyze_case(&[document(1)], &ctx(), Some(&store))
            .await
            .unwrap();

        let stored = store.load_line_items(&ctx().case_id).unwrap();
        assert_eq!(report.line_items.len(), 1);
        assert_eq!(stored, report.line_items);
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected() {
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::new("secondary", clean_bill()),
        );
        let err = p.analyze_case(&[], &ctx(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoDocuments));

        let err = p.analyze_case(&[document(0)], &ctx(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument(name) if name == "bill.png"));
    }

    #[tokio::test]
    async fn duplicate_lines_become_findings() {
        let dup = bill(vec![row("99213", "$150.00"), row("99213", "$150.00")]);
        let p = pipeline(
            MockVendor::new("primary", dup.clone()),
            MockVendor::new("secondary", dup),
        );
        let report = p.analyze_case(&[document(1)], &ctx(), None).await.unwrap();

        assert_eq!(report.status(), RunStatus::Findings);
        assert_eq!(report.counts.get(&DetectionCategory::Duplicate), Some(&1));
        assert!(report.citations.len() > 2);
    }

    #[tokio::test]
    async fn results_are_persisted_when_store_given() {
        let store = SqliteExtractionStore::in_memory().unwrap();
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::new("secondary", clean_bill()),
        );
        let report = p
            .analyze_case(&[document(1)], &ctx(), Some(&store))
            .await
            .unwrap();

        assert_eq!(report.persistence, PersistenceStatus::Saved);
        let stored = store.load_line_items(&ctx().case_id).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|i| i.doc_type == DocType::Bill));
    }

    struct BrokenStore;

    impl ExtractionStore for BrokenStore {
        fn save_line_items(&self, _: &[NormalizedLineItem]) -> Result<(), DatabaseError> {
            Err(DatabaseError::LockFailed)
        }
        fn load_line_items(&self, _: &Uuid) -> Result<Vec<NormalizedLineItem>, DatabaseError> {
            Ok(vec![])
        }
        fn save_detections(&self, _: &Uuid, _: &[Detection]) -> Result<(), DatabaseError> {
            Err(DatabaseError::LockFailed)
        }
        fn load_detections(&self, _: &Uuid) -> Result<Vec<Detection>, DatabaseError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_results() {
        let p = pipeline(
            MockVendor::new("primary", clean_bill()),
            MockVendor::new("secondary", clean_bill()),
        );
        let report = p
            .analyze_case(&[document(1)], &ctx(), Some(&BrokenStore))
            .await
            .unwrap();

        assert_eq!(report.status(), RunStatus::PersistenceFailed);
        assert_eq!(report.line_items.len(), 2);
    }

    #[test]
    fn artifact_id_follows_content() {
        let a = document(2);
        let mut b = document(2);
        assert_eq!(a.digest().len(), 64);
        assert_eq!(a.artifact_id(), b.artifact_id());
        b.pages[1].buffer.push(0xFF);
        assert_ne!(a.artifact_id(), b.artifact_id());
    }

    #[test]
    fn from_config_builds_named_adapters() {
        let vendor = |name: &str, api| VendorConfig {
            name: name.into(),
            api,
            base_url: "http://127.0.0.1:1".into(),
            model: "m".into(),
            api_key: "k".into(),
        };
        let config = PipelineConfig {
            primary: vendor("primary", VendorApi::ChatCompletions),
            secondary: vendor("secondary", VendorApi::Messages),
            vendor_timeout_secs: 7,
            page_concurrency: 0,
        };
        let p = ExtractionPipeline::from_config(&config).unwrap();
        assert_eq!(p.primary.name(), "primary");
        assert_eq!(p.secondary.name(), "secondary");
        assert_eq!(p.vendor_timeout, Duration::from_secs(7));
        assert_eq!(p.page_concurrency, 1);
    }

    #[test]
    fn report_serializes_status_fields() {
        let json = serde_json::to_value(PersistenceStatus::Failed("disk full".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "disk full");
        assert_eq!(serde_json::to_value(RunStatus::Clean).unwrap(), "clean");
    }
}

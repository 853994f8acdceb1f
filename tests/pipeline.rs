//! Controller behaviour against in-memory rasterizers and extractors.
//!
//! No pdfium, no tesseract, no network: every engine here is a fake, so
//! these run everywhere.

use async_trait::async_trait;
use futures::StreamExt;
use pdf2png::{
    process_stream, Document, DocumentRasterizer, ErrorKind, ExtractionError, OverallStatus,
    PageImage, PageRecord, PageStatus, PageTextExtractor, Pipeline, PipelineConfig,
    PipelineError, PipelineEvent, PipelineObserver, RasterOptions, RasterPage,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Renders `pages` tiny pages, or fails the way it is told to.
struct FakeRasterizer {
    pages: usize,
    fail_on_page: Option<usize>,
    ready: bool,
    seen_scale: Mutex<Option<f32>>,
}

impl FakeRasterizer {
    fn pages(n: usize) -> Arc<Self> {
        Arc::new(Self {
            pages: n,
            fail_on_page: None,
            ready: true,
            seen_scale: Mutex::new(None),
        })
    }

    fn failing_at(n: usize, page: usize) -> Arc<Self> {
        Arc::new(Self {
            pages: n,
            fail_on_page: Some(page),
            ready: true,
            seen_scale: Mutex::new(None),
        })
    }

    fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            pages: 1,
            fail_on_page: None,
            ready: false,
            seen_scale: Mutex::new(None),
        })
    }
}

#[async_trait]
impl DocumentRasterizer for FakeRasterizer {
    fn ensure_ready(&self) -> Result<(), PipelineError> {
        if self.ready {
            Ok(())
        } else {
            Err(PipelineError::Configuration("libpdfium.so not found".into()))
        }
    }

    async fn rasterize(
        &self,
        name: &str,
        pdf: Vec<u8>,
        options: &RasterOptions,
    ) -> Result<Vec<RasterPage>, PipelineError> {
        *self.seen_scale.lock().unwrap() = Some(options.scale);
        if !pdf.starts_with(b"%PDF") {
            return Err(PipelineError::Load {
                name: name.to_string(),
                detail: "FormatError".into(),
            });
        }
        let mut out = Vec::new();
        for page in 1..=self.pages {
            if self.fail_on_page == Some(page) {
                return Err(PipelineError::Render {
                    page,
                    detail: "bitmap allocation failed".into(),
                });
            }
            out.push(RasterPage {
                width: 100,
                height: 140,
                png: vec![page as u8; 8],
            });
        }
        Ok(out)
    }
}

/// Answers per page from a script; unscripted pages return `page <n>`.
#[derive(Default)]
struct ScriptedExtractor {
    script: HashMap<usize, Result<String, ExtractionError>>,
    delays_ms: HashMap<usize, u64>,
    cancel_after: Mutex<Option<(usize, pdf2png::CancelHandle)>>,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    fn text(mut self, page: usize, text: &str) -> Self {
        self.script.insert(page, Ok(text.to_string()));
        self
    }

    fn fail(mut self, page: usize) -> Self {
        self.script.insert(
            page,
            Err(ExtractionError::RecognitionFailed("unreadable".into())),
        );
        self
    }

    fn delay(mut self, page: usize, ms: u64) -> Self {
        self.delays_ms.insert(page, ms);
        self
    }
}

#[async_trait]
impl PageTextExtractor for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract_text(&self, image: &PageImage) -> Result<String, ExtractionError> {
        let page = image.page_num;
        self.calls.lock().unwrap().push(page);
        if let Some(ms) = self.delays_ms.get(&page) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if let Some((after, ref handle)) = *self.cancel_after.lock().unwrap() {
            if page == after {
                handle.cancel();
            }
        }
        match self.script.get(&page) {
            Some(result) => result.clone(),
            None => Ok(format!("page {page}")),
        }
    }
}

/// Keeps every event in publish order.
#[derive(Default)]
struct Recorder(Mutex<Vec<PipelineEvent>>);

impl Recorder {
    fn events(&self) -> Vec<PipelineEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl PipelineObserver for Recorder {
    fn on_cleared(&self) {
        self.0.lock().unwrap().push(PipelineEvent::Cleared);
    }

    fn on_status_changed(&self, status: &OverallStatus) {
        self.0.lock().unwrap().push(PipelineEvent::StatusChanged {
            status: status.clone(),
        });
    }

    fn on_pages_created(&self, records: &[PageRecord]) {
        self.0.lock().unwrap().push(PipelineEvent::PagesCreated {
            records: records.to_vec(),
        });
    }

    fn on_page_updated(&self, index: usize, record: &PageRecord) {
        self.0.lock().unwrap().push(PipelineEvent::PageUpdated {
            index,
            record: record.clone(),
        });
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn report() -> Document {
    Document::from_bytes("report.pdf", b"%PDF-1.7\n".to_vec())
}

/// Per-page status sequences as observed through `PageUpdated`.
fn status_history(events: &[PipelineEvent]) -> HashMap<usize, Vec<PageStatus>> {
    let mut history: HashMap<usize, Vec<PageStatus>> = HashMap::new();
    for event in events {
        if let PipelineEvent::PageUpdated { index, record } = event {
            history.entry(*index).or_default().push(record.status);
        }
    }
    history
}

fn assert_monotonic(events: &[PipelineEvent]) {
    for (index, statuses) in status_history(events) {
        let mut prev = PageStatus::Pending;
        for s in statuses {
            assert!(
                prev.can_transition_to(s),
                "page {index}: observed {prev} → {s}"
            );
            prev = s;
        }
    }
}

fn statuses(pipeline: &Pipeline) -> Vec<PageStatus> {
    pipeline.records().iter().map(|r| r.status).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pages_with_middle_failure() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(3))
        .extractor(Arc::new(
            ScriptedExtractor::default()
                .text(1, "Hello")
                .fail(2)
                .text(3, "World"),
        ))
        .observer(recorder.clone())
        .build();

    let summary = pipeline.process_document(report()).await.unwrap();
    assert_eq!((summary.pages, summary.completed, summary.failed), (3, 2, 1));

    let records = pipeline.records();
    assert_eq!(records[0].status, PageStatus::Complete);
    assert_eq!(records[0].text.as_deref(), Some("Hello"));
    assert_eq!(records[1].status, PageStatus::Error);
    assert!(records[1].text.is_none());
    assert_eq!(records[2].status, PageStatus::Complete);
    assert_eq!(records[2].text.as_deref(), Some("World"));
    assert_eq!(
        *pipeline.status(),
        OverallStatus::Complete {
            pages: 3,
            failed: 1
        }
    );
    assert_monotonic(&recorder.events());
}

#[tokio::test]
async fn publishes_phases_in_order() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(2))
        .extractor(Arc::new(ScriptedExtractor::default()))
        .observer(recorder.clone())
        .build();
    pipeline.process_document(report()).await.unwrap();

    let events = recorder.events();
    let compact: Vec<String> = events
        .iter()
        .map(|e| match e {
            PipelineEvent::Cleared => "cleared".to_string(),
            PipelineEvent::StatusChanged { status } => match status {
                OverallStatus::Reading => "reading".into(),
                OverallStatus::Converting => "converting".into(),
                OverallStatus::Extracting { .. } => "extracting".into(),
                OverallStatus::Complete { .. } => "complete".into(),
                other => format!("{other:?}"),
            },
            PipelineEvent::PagesCreated { records } => format!("created:{}", records.len()),
            PipelineEvent::PageUpdated { index, record } => format!("{index}:{}", record.status),
        })
        .collect();

    assert_eq!(
        compact,
        vec![
            "cleared",
            "reading",
            "converting",
            "created:2",
            "extracting",
            "0:processing",
            "0:complete",
            "1:processing",
            "1:complete",
            "complete",
        ]
    );
}

#[tokio::test]
async fn records_match_pages_in_order_and_are_named() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(12))
        .extractor(Arc::new(ScriptedExtractor::default()))
        .observer(recorder.clone())
        .build();
    pipeline.process_document(report()).await.unwrap();

    let records = pipeline.records();
    assert_eq!(records.len(), 12);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.page_num(), i + 1);
        assert_eq!(r.filename, format!("report_page_{}.png", i + 1));
        assert_eq!(r.image.png(), vec![(i + 1) as u8; 8].as_slice());
        assert_eq!(r.text.as_deref(), Some(format!("page {}", i + 1).as_str()));
        assert!(r.status.is_terminal());
    }

    // Pages are downloadable (all pending) before any extraction starts.
    let created = recorder
        .events()
        .into_iter()
        .find_map(|e| match e {
            PipelineEvent::PagesCreated { records } => Some(records),
            _ => None,
        })
        .unwrap();
    assert!(created.iter().all(|r| r.status == PageStatus::Pending));
    assert!(created.iter().all(|r| r.image.byte_len == 8));
}

#[tokio::test]
async fn path_in_source_name_is_not_part_of_download_name() {
    init_tracing();
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(2))
        .build();
    pipeline
        .process_document(Document::from_bytes("/srv/uploads/report.pdf", b"%PDF-1.7".to_vec()))
        .await
        .unwrap();
    let names: Vec<&str> = pipeline.records().iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["report_page_1.png", "report_page_2.png"]);
}

#[tokio::test]
async fn empty_document_completes_with_no_records() {
    init_tracing();
    let extractor = Arc::new(ScriptedExtractor::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(0))
        .extractor(extractor.clone())
        .build();
    let summary = pipeline.process_document(report()).await.unwrap();

    assert_eq!(summary.pages, 0);
    assert!(pipeline.records().is_empty());
    assert!(extractor.calls.lock().unwrap().is_empty());
    assert_eq!(
        *pipeline.status(),
        OverallStatus::Complete {
            pages: 0,
            failed: 0
        }
    );
}

#[tokio::test]
async fn empty_text_is_success() {
    init_tracing();
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(1))
        .extractor(Arc::new(ScriptedExtractor::default().text(1, "")))
        .build();
    pipeline.process_document(report()).await.unwrap();
    assert_eq!(pipeline.records()[0].status, PageStatus::Complete);
    assert_eq!(pipeline.records()[0].text.as_deref(), Some(""));
}

#[tokio::test]
async fn configured_scale_reaches_rasterizer() {
    init_tracing();
    let rasterizer = FakeRasterizer::pages(1);
    let mut pipeline = Pipeline::builder()
        .rasterizer(rasterizer.clone())
        .config(PipelineConfig::builder().scale(2.5).build().unwrap())
        .build();
    pipeline.process_document(report()).await.unwrap();
    assert_eq!(*rasterizer.seen_scale.lock().unwrap(), Some(2.5));

    let rasterizer = FakeRasterizer::pages(1);
    let mut pipeline = Pipeline::builder().rasterizer(rasterizer.clone()).build();
    pipeline.process_document(report()).await.unwrap();
    assert_eq!(*rasterizer.seen_scale.lock().unwrap(), Some(pdf2png::DEFAULT_SCALE));
}

// ── Fatal failures ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_rasterizer_reports_configuration_error() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let extractor = Arc::new(ScriptedExtractor::default());
    let mut pipeline = Pipeline::builder()
        .extractor(extractor.clone())
        .observer(recorder.clone())
        .build();

    let err = pipeline.process_document(report()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(pipeline.records().is_empty());
    assert!(extractor.calls.lock().unwrap().is_empty());

    match pipeline.status() {
        OverallStatus::Error { kind, message } => {
            assert_eq!(*kind, ErrorKind::Configuration);
            assert!(message.contains("library not loaded"), "{message}");
        }
        other => panic!("unexpected status {other:?}"),
    }
    // Nothing after `reading` except the error itself.
    let events = recorder.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::StatusChanged { status: OverallStatus::Converting })));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::PagesCreated { .. })));
}

#[tokio::test]
async fn unbindable_rasterizer_reports_configuration_error() {
    init_tracing();
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::unavailable())
        .build();
    let err = pipeline.process_document(report()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert!(pipeline.status().to_string().contains("library not loaded"));
    assert!(pipeline.records().is_empty());
}

#[tokio::test]
async fn unparsable_document_is_load_error() {
    init_tracing();
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(3))
        .build();
    let err = pipeline
        .process_document(Document::from_bytes("junk.pdf", b"not a pdf".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(pipeline.records().is_empty());
    assert!(pipeline.status().is_error());
}

/// A page that fails to render abandons the whole document: no records,
/// not even for the pages rendered before it.
#[tokio::test]
async fn render_failure_is_atomic() {
    init_tracing();
    let extractor = Arc::new(ScriptedExtractor::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::failing_at(5, 3))
        .extractor(extractor.clone())
        .build();

    let err = pipeline.process_document(report()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Render { page: 3, .. }));
    assert!(pipeline.records().is_empty());
    assert!(extractor.calls.lock().unwrap().is_empty());
    assert!(pipeline.status().to_string().contains("page 3"));
}

#[tokio::test]
async fn unreadable_input_path_fails_while_reading() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(1))
        .observer(recorder.clone())
        .build();

    let err = pipeline
        .process_input("/definitely/not/here.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::FileNotFound { .. }));
    assert!(pipeline.records().is_empty());

    let statuses: Vec<OverallStatus> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::StatusChanged { status } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0], OverallStatus::Reading);
    assert!(matches!(
        statuses[1],
        OverallStatus::Error {
            kind: ErrorKind::Input,
            ..
        }
    ));
}

// ── Successive runs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn new_run_clears_previous_records_first() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(3))
        .extractor(Arc::new(ScriptedExtractor::default()))
        .observer(recorder.clone())
        .build();

    pipeline.process_document(report()).await.unwrap();
    assert_eq!(pipeline.records().len(), 3);
    let first_run = recorder.events().len();

    pipeline
        .process_document(Document::from_bytes("second.pdf", b"%PDF-1.4".to_vec()))
        .await
        .unwrap();

    let events = recorder.events();
    let second: Vec<_> = events[first_run..].to_vec();
    assert!(matches!(second[0], PipelineEvent::Cleared));
    // The first record published in the second run comes from the new document.
    let first_created = second
        .iter()
        .find_map(|e| match e {
            PipelineEvent::PagesCreated { records } => Some(records.clone()),
            _ => None,
        })
        .unwrap();
    assert!(first_created.iter().all(|r| r.filename.starts_with("second_page_")));
    assert!(pipeline
        .records()
        .iter()
        .all(|r| r.filename.starts_with("second_page_")));
}

#[tokio::test]
async fn failed_run_after_success_leaves_no_stale_records() {
    init_tracing();
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(2))
        .build();
    pipeline.process_document(report()).await.unwrap();
    assert_eq!(pipeline.records().len(), 2);

    let err = pipeline
        .process_document(Document::from_bytes("bad.pdf", b"garbage".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(pipeline.records().is_empty());
    assert!(pipeline.snapshot().pages.is_empty());
}

// ── OCR disabled / concurrency / cancellation ────────────────────────────────

#[tokio::test]
async fn without_extractor_pages_are_skipped() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(2))
        .observer(recorder.clone())
        .build();
    let summary = pipeline.process_document(report()).await.unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(statuses(&pipeline), vec![PageStatus::Skipped; 2]);
    assert!(pipeline.records().iter().all(|r| r.text.is_none()));
    assert!(!recorder
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::StatusChanged { status: OverallStatus::Extracting { .. } })));
    assert_monotonic(&recorder.events());
}

#[tokio::test]
async fn concurrent_extraction_keeps_per_page_ordering() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    // Page 1 is slowest, so pages finish out of order.
    let extractor = ScriptedExtractor::default()
        .delay(1, 60)
        .delay(2, 5)
        .delay(3, 20)
        .fail(4)
        .delay(5, 1);
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(6))
        .extractor(Arc::new(extractor))
        .config(PipelineConfig::builder().concurrency(3).build().unwrap())
        .observer(recorder.clone())
        .build();

    let summary = pipeline.process_document(report()).await.unwrap();
    assert_eq!((summary.completed, summary.failed), (5, 1));

    let events = recorder.events();
    assert_monotonic(&events);

    // Every page went through processing exactly once, started in index order.
    let started: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PageUpdated { index, record } if record.status == PageStatus::Processing => {
                Some(*index)
            }
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![0, 1, 2, 3, 4, 5]);

    // Never more than three pages processing at once.
    let mut in_flight = 0usize;
    for e in &events {
        if let PipelineEvent::PageUpdated { record, .. } = e {
            match record.status {
                PageStatus::Processing => in_flight += 1,
                s if s.is_terminal() => in_flight -= 1,
                _ => {}
            }
            assert!(in_flight <= 3);
        }
    }

    // Records stay in document order regardless of completion order.
    let nums: Vec<usize> = pipeline.records().iter().map(|r| r.page_num()).collect();
    assert_eq!(nums, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(pipeline.records()[3].status, PageStatus::Error);
}

#[tokio::test]
async fn sequential_extraction_has_one_page_processing() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(4))
        .extractor(Arc::new(ScriptedExtractor::default().delay(2, 10)))
        .observer(recorder.clone())
        .build();
    pipeline.process_document(report()).await.unwrap();

    let mut processing = 0usize;
    for e in recorder.events() {
        if let PipelineEvent::PageUpdated { record, .. } = e {
            match record.status {
                PageStatus::Processing => processing += 1,
                _ => processing -= 1,
            }
            assert!(processing <= 1);
        }
    }
}

#[tokio::test]
async fn cancellation_marks_unstarted_pages() {
    init_tracing();
    let extractor = Arc::new(ScriptedExtractor::default());
    let mut pipeline = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(4))
        .extractor(extractor.clone())
        .build();
    *extractor.cancel_after.lock().unwrap() = Some((2, pipeline.cancel_handle()));

    let summary = pipeline.process_document(report()).await.unwrap();
    assert_eq!(
        statuses(&pipeline),
        vec![
            PageStatus::Complete,
            PageStatus::Complete,
            PageStatus::Cancelled,
            PageStatus::Cancelled
        ]
    );
    assert_eq!(summary.cancelled, 2);
    assert_eq!(*extractor.calls.lock().unwrap(), vec![1, 2]);
    assert_eq!(
        *pipeline.status(),
        OverallStatus::Cancelled {
            finished: 2,
            pages: 4
        }
    );
}

// ── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_events_then_final_state() {
    init_tracing();
    let builder = Pipeline::builder()
        .rasterizer(FakeRasterizer::pages(3))
        .extractor(Arc::new(ScriptedExtractor::default().fail(2)));

    let (events, run) = process_stream(builder, report());
    let events: Vec<PipelineEvent> = events.collect().await;
    let (snapshot, result) = run.await.unwrap();

    assert!(matches!(events.first(), Some(PipelineEvent::Cleared)));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::StatusChanged {
            status: OverallStatus::Complete { pages: 3, failed: 1 }
        })
    ));
    assert_monotonic(&events);

    let summary = result.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(snapshot.pages.len(), 3);
    assert_eq!(snapshot.pages[1].status, PageStatus::Error);
    assert!(snapshot.message.contains("failed on 1"));
}

#[tokio::test]
async fn stream_reports_fatal_error() {
    init_tracing();
    let builder = Pipeline::builder();
    let (events, run) = process_stream(builder, report());
    let events: Vec<PipelineEvent> = events.collect().await;
    let (snapshot, result) = run.await.unwrap();

    assert!(result.is_err());
    assert!(snapshot.status.is_error());
    assert!(snapshot.pages.is_empty());
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::PagesCreated { .. })));
}

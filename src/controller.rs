//! The page pipeline controller.
//!
//! [`Pipeline`] sequences one run: clear the previous run, read the
//! document, rasterise every page, then extract text page by page while
//! publishing each state change to the registered observers.
//!
//! Failures split the same way the error types do: anything before the page
//! records exist is fatal and returned as a [`PipelineError`]; a failed
//! extraction only marks its own page `error` and the run goes on.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{page_filename, OverallStatus, PageImage, PageRecord, RunSummary, Snapshot};
use crate::pipeline::input::{self, Document};
use crate::pipeline::ocr::PageTextExtractor;
use crate::pipeline::render::{DocumentRasterizer, RasterOptions};
use crate::progress::{Observers, SharedObserver};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Default HTTP download timeout for [`Pipeline::process_input`].
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Requests cancellation of the run in progress.
///
/// Cloned handles share one flag. The controller checks it before starting
/// each page; extractions already running are allowed to finish and every
/// page not yet started ends `cancelled`. The flag is cleared when the next
/// run starts.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Builder for [`Pipeline`].
///
/// ```rust
/// use pdf2png::{PdfiumRasterizer, Pipeline, TesseractExtractor};
/// use std::sync::Arc;
///
/// let pipeline = Pipeline::builder()
///     .rasterizer(Arc::new(PdfiumRasterizer::new()))
///     .extractor(Arc::new(TesseractExtractor::default()))
///     .build();
/// assert!(pipeline.records().is_empty());
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    rasterizer: Option<Arc<dyn DocumentRasterizer>>,
    extractor: Option<Arc<dyn PageTextExtractor>>,
    config: PipelineConfig,
    observers: Observers,
    download_timeout_secs: Option<u64>,
}

impl PipelineBuilder {
    pub fn rasterizer(mut self, rasterizer: Arc<dyn DocumentRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Without an extractor OCR is disabled and every page ends `skipped`.
    pub fn extractor(mut self, extractor: Arc<dyn PageTextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an observer. May be called repeatedly.
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            rasterizer: self.rasterizer,
            extractor: self.extractor,
            config: self.config,
            observers: self.observers,
            download_timeout_secs: self
                .download_timeout_secs
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            cancel: CancelHandle::default(),
            records: Vec::new(),
            status: OverallStatus::Idle,
        }
    }
}

/// Drives a rasterizer and an optional text extractor over one document at
/// a time and owns the resulting page records.
pub struct Pipeline {
    rasterizer: Option<Arc<dyn DocumentRasterizer>>,
    extractor: Option<Arc<dyn PageTextExtractor>>,
    config: PipelineConfig,
    observers: Observers,
    download_timeout_secs: u64,
    cancel: CancelHandle,
    records: Vec<PageRecord>,
    status: OverallStatus,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Page records of the current (or last) run, in page order.
    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    pub fn status(&self) -> &OverallStatus {
        &self.status
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A handle that cancels this pipeline's runs from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Clone of the current status and every page record.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status.clone(),
            message: self.status.to_string(),
            pages: self.records.clone(),
        }
    }

    /// Read `input` (a local path or an http(s) URL) and process it.
    ///
    /// The document is read while the status is `reading`; read failures are
    /// fatal and leave the page collection empty.
    pub async fn process_input(&mut self, input: &str) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        info!("Starting conversion: {}", input);
        self.reset();
        self.set_status(OverallStatus::Reading);

        let rasterizer = self.ready_rasterizer().map_err(|e| self.fatal(e))?;
        let document = input::resolve_input(input, self.download_timeout_secs)
            .await
            .map_err(|e| self.fatal(e))?;

        self.run(rasterizer, document, start).await
    }

    /// Process a document that is already in memory.
    ///
    /// Returns `Ok` once every page is terminal, even if some extractions
    /// failed; check [`RunSummary::failed`].
    ///
    /// # Errors
    /// Only fatal errors: no usable rasterizer, a document that cannot be
    /// loaded, or a page that cannot be rendered. In each case the status is
    /// `error` and no page records exist.
    pub async fn process_document(&mut self, document: Document) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        info!("Starting conversion: {}", document.name());
        self.reset();
        self.set_status(OverallStatus::Reading);

        let rasterizer = self.ready_rasterizer().map_err(|e| self.fatal(e))?;
        self.run(rasterizer, document, start).await
    }

    async fn run(
        &mut self,
        rasterizer: Arc<dyn DocumentRasterizer>,
        document: Document,
        start: Instant,
    ) -> Result<RunSummary, PipelineError> {
        // ── Rasterise ────────────────────────────────────────────────────
        self.set_status(OverallStatus::Converting);
        let (name, bytes) = document.into_parts();
        let options = RasterOptions {
            scale: self.config.scale,
            password: self.config.password.clone(),
        };

        let render_start = Instant::now();
        let pages = rasterizer
            .rasterize(&name, bytes, &options)
            .await
            .map_err(|e| self.fatal(e))?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

        // ── Build records ────────────────────────────────────────────────
        self.records = pages
            .into_iter()
            .enumerate()
            .map(|(idx, page)| {
                let page_num = idx + 1;
                PageRecord::new(PageImage::new(
                    page_num,
                    page_filename(&name, page_num),
                    page.width,
                    page.height,
                    page.png,
                ))
            })
            .collect();
        self.observers.pages_created(&self.records);

        // ── Extract ──────────────────────────────────────────────────────
        let extract_start = Instant::now();
        self.extract_or_fail().await?;

        let mut summary = RunSummary::tally(&self.records);
        summary.render_duration_ms = render_duration_ms;
        summary.extract_duration_ms = extract_start.elapsed().as_millis() as u64;
        summary.total_duration_ms = start.elapsed().as_millis() as u64;

        let status = if summary.cancelled > 0 {
            OverallStatus::Cancelled {
                finished: summary.pages - summary.cancelled,
                pages: summary.pages,
            }
        } else {
            OverallStatus::Complete {
                pages: summary.pages,
                failed: summary.failed,
            }
        };
        self.set_status(status);

        info!(
            "Conversion complete: {}/{} pages with text, {}ms total",
            summary.completed, summary.pages, summary.total_duration_ms
        );
        Ok(summary)
    }

    /// [`Self::extract_phase`], recording any error as the overall status.
    async fn extract_or_fail(&mut self) -> Result<(), PipelineError> {
        self.extract_phase().await.map_err(|e| self.fatal(e))
    }

    /// Extract every page, or mark every page `skipped` when OCR is off.
    async fn extract_phase(&mut self) -> Result<(), PipelineError> {
        match self.extractor.clone() {
            Some(extractor) => self.extract_all(extractor).await,
            None => {
                debug!("OCR disabled; skipping {} pages", self.records.len());
                for index in 0..self.records.len() {
                    self.update(index, PageRecord::skip)?;
                }
                Ok(())
            }
        }
    }

    /// Run the extractor over every record with at most `concurrency`
    /// extractions in flight.
    ///
    /// Pages are started in index order. All record mutation happens here,
    /// between awaits, so a page's `processing` update is always published
    /// before its terminal one.
    async fn extract_all(&mut self, extractor: Arc<dyn PageTextExtractor>) -> Result<(), PipelineError> {
        let total = self.records.len();
        self.set_status(OverallStatus::Extracting { pages: total });

        let limit = self.config.concurrency.max(1);
        let mut in_flight = FuturesUnordered::new();
        let mut next = 0;

        loop {
            while in_flight.len() < limit && next < total && !self.cancel.is_cancelled() {
                let index = next;
                next += 1;
                self.update(index, PageRecord::begin)?;

                let image = self.records[index].image.clone();
                let extractor = Arc::clone(&extractor);
                in_flight.push(async move {
                    let started = Instant::now();
                    let result = extractor.extract_text(&image).await;
                    (index, result, started.elapsed())
                });
            }

            let Some((index, result, elapsed)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok(text) => {
                    debug!(
                        "Page {}: {} chars via {} in {:?}",
                        index + 1,
                        text.len(),
                        extractor.name(),
                        elapsed
                    );
                    self.update(index, |r| r.complete(text))?;
                }
                Err(e) => {
                    warn!("Page {}: text extraction failed: {}", index + 1, e);
                    self.update(index, |r| r.fail(e.to_string()))?;
                }
            }
        }

        if next < total {
            info!("Cancelled with {} of {} pages not started", total - next, total);
            for index in next..total {
                self.update(index, PageRecord::cancel)?;
            }
        }
        Ok(())
    }

    fn ready_rasterizer(&self) -> Result<Arc<dyn DocumentRasterizer>, PipelineError> {
        let rasterizer = self
            .rasterizer
            .clone()
            .ok_or_else(|| PipelineError::Configuration("no rasterizer configured".into()))?;
        rasterizer.ensure_ready()?;
        Ok(rasterizer)
    }

    /// Drop the previous run's records and tell observers.
    fn reset(&mut self) {
        self.cancel.reset();
        self.records = Vec::new();
        self.status = OverallStatus::Idle;
        self.observers.cleared();
    }

    fn set_status(&mut self, status: OverallStatus) {
        debug!("Status: {}", status);
        self.observers.status(&status);
        self.status = status;
    }

    /// Record a fatal error as the overall status and hand it back.
    fn fatal(&mut self, err: PipelineError) -> PipelineError {
        error!("{}", err);
        self.set_status(OverallStatus::from_error(&err));
        err
    }

    fn update(
        &mut self,
        index: usize,
        step: impl FnOnce(&mut PageRecord) -> Result<(), PipelineError>,
    ) -> Result<(), PipelineError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or_else(|| PipelineError::Internal(format!("no page record at index {index}")))?;
        step(record)?;
        self.observers.page_updated(index, record);
        Ok(())
    }
}

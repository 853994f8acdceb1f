//! Observer-facing state: page images, page records, and the overall status.
//!
//! Everything here is plain data. The [`crate::Pipeline`] owns one
//! collection of [`PageRecord`]s per run and is the only code that mutates
//! it; observers receive borrowed views or cloned [`Snapshot`]s.

use crate::error::{ErrorKind, PipelineError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

// ── Naming ───────────────────────────────────────────────────────────────

/// Download name for page `page_num` (1-indexed) of `source_name`.
///
/// Only the final path component of the source name is used, so the result
/// is always a bare file name. A trailing `.pdf` (any case) is removed; any
/// other extension is kept as part of the stem.
///
/// ```rust
/// assert_eq!(pdf2png::page_filename("report.pdf", 2), "report_page_2.png");
/// assert_eq!(pdf2png::page_filename("SCAN.PDF", 1), "SCAN_page_1.png");
/// assert_eq!(pdf2png::page_filename("/tmp/in/report.pdf", 1), "report_page_1.png");
/// ```
pub fn page_filename(source_name: &str, page_num: usize) -> String {
    format!("{}_page_{}.png", strip_pdf_extension(base_name(source_name)), page_num)
}

/// Last component of `name`, splitting on both `/` and `\`.
fn base_name(name: &str) -> &str {
    match name.rsplit(['/', '\\']).next() {
        Some(base) if !base.is_empty() => base,
        _ => "document",
    }
}

fn strip_pdf_extension(name: &str) -> &str {
    let cut = name.len().saturating_sub(4);
    if name.len() >= 4 && name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".pdf") {
        &name[..cut]
    } else {
        name
    }
}

// ── Page image ───────────────────────────────────────────────────────────

/// One rasterised page: lossless PNG bytes plus its download name.
///
/// The pixel buffer is shared (`Arc`) so cloning a record for an observer
/// never copies image data. It is never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct PageImage {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    /// Download name, e.g. `report_page_1.png`.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded PNG in bytes.
    pub byte_len: usize,
    #[serde(skip)]
    png: Arc<[u8]>,
}

impl PageImage {
    pub fn new(page_num: usize, name: impl Into<String>, width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            page_num,
            name: name.into(),
            width,
            height,
            byte_len: png.len(),
            png: Arc::from(png),
        }
    }

    /// The encoded PNG.
    pub fn png(&self) -> &[u8] {
        &self.png
    }
}

// ── Page status ──────────────────────────────────────────────────────────

/// Extraction status of one page.
///
/// ```text
/// pending ──▶ processing ──▶ complete
///    │                  └──▶ error
///    ├──▶ cancelled   (run cancelled before the page started)
///    └──▶ skipped     (OCR disabled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Pending,
    Processing,
    Complete,
    Error,
    Cancelled,
    Skipped,
}

impl PageStatus {
    /// `true` once the page will never change again in this run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PageStatus::Pending | PageStatus::Processing)
    }

    /// Whether the state machine allows `self → next`.
    pub fn can_transition_to(self, next: PageStatus) -> bool {
        use PageStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Pending, Skipped)
                | (Processing, Complete)
                | (Processing, Error)
        )
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PageStatus::Pending => "pending",
            PageStatus::Processing => "processing",
            PageStatus::Complete => "complete",
            PageStatus::Error => "error",
            PageStatus::Cancelled => "cancelled",
            PageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ── Page record ──────────────────────────────────────────────────────────

/// Per-page state published to observers.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub image: PageImage,
    pub filename: String,
    /// Recognised text; `None` until extraction completes successfully.
    pub text: Option<String>,
    pub status: PageStatus,
    /// Human-readable extraction failure, set only in [`PageStatus::Error`].
    pub error: Option<String>,
}

impl PageRecord {
    /// A fresh `pending` record for `image`.
    pub fn new(image: PageImage) -> Self {
        let filename = image.name.clone();
        Self {
            image,
            filename,
            text: None,
            status: PageStatus::Pending,
            error: None,
        }
    }

    pub fn page_num(&self) -> usize {
        self.image.page_num
    }

    fn advance(&mut self, next: PageStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                page: self.page_num(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn begin(&mut self) -> Result<(), PipelineError> {
        self.advance(PageStatus::Processing)
    }

    pub(crate) fn complete(&mut self, text: String) -> Result<(), PipelineError> {
        self.advance(PageStatus::Complete)?;
        self.text = Some(text);
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: String) -> Result<(), PipelineError> {
        self.advance(PageStatus::Error)?;
        self.text = None;
        self.error = Some(error);
        Ok(())
    }

    pub(crate) fn cancel(&mut self) -> Result<(), PipelineError> {
        self.advance(PageStatus::Cancelled)
    }

    pub(crate) fn skip(&mut self) -> Result<(), PipelineError> {
        self.advance(PageStatus::Skipped)
    }
}

// ── Overall status ───────────────────────────────────────────────────────

/// Pipeline phase, rendered as a human-readable line by `Display`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum OverallStatus {
    #[default]
    Idle,
    Reading,
    Converting,
    Extracting { pages: usize },
    Complete { pages: usize, failed: usize },
    Cancelled { finished: usize, pages: usize },
    Error { kind: ErrorKind, message: String },
}

impl OverallStatus {
    pub(crate) fn from_error(err: &PipelineError) -> Self {
        OverallStatus::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OverallStatus::Error { .. })
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Idle => f.write_str("Select a PDF file to convert"),
            OverallStatus::Reading => f.write_str("Reading file..."),
            OverallStatus::Converting => f.write_str("Converting PDF pages to PNG..."),
            OverallStatus::Extracting { pages } => {
                write!(f, "Extracting text from {pages} page(s)...")
            }
            OverallStatus::Complete { pages, failed: 0 } => {
                write!(f, "Conversion complete: {pages} page(s) converted.")
            }
            OverallStatus::Complete { pages, failed } => write!(
                f,
                "Conversion complete: {pages} page(s) converted, text extraction failed on {failed}."
            ),
            OverallStatus::Cancelled { finished, pages } => {
                write!(f, "Cancelled after {finished}/{pages} page(s).")
            }
            OverallStatus::Error { message, .. } => write!(f, "Error: {message}"),
        }
    }
}

// ── Run results ──────────────────────────────────────────────────────────

/// Counters and timings for one finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub render_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub(crate) fn tally(records: &[PageRecord]) -> Self {
        let count = |s: PageStatus| records.iter().filter(|r| r.status == s).count();
        Self {
            pages: records.len(),
            completed: count(PageStatus::Complete),
            failed: count(PageStatus::Error),
            cancelled: count(PageStatus::Cancelled),
            skipped: count(PageStatus::Skipped),
            ..Default::default()
        }
    }
}

/// Cloned view of the pipeline state at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub status: OverallStatus,
    /// `status` rendered for display.
    pub message: String,
    pub pages: Vec<PageRecord>,
}

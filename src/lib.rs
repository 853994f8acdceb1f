//! # pdf2png
//!
//! Rasterise PDF documents to one PNG per page and, optionally, extract the
//! text of each page with OCR.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Read     local file, URL download, or caller-supplied buffer
//!  ├─ 2. Render   every page → PNG via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Publish  one `pending` PageRecord per page
//!  ├─ 4. Extract  page by page: processing → complete | error
//!  └─ 5. Export   <name>_page_<n>.png (+ .txt) per page
//! ```
//!
//! PDF rendering and text recognition are delegated to engines behind two
//! traits, [`DocumentRasterizer`] and [`PageTextExtractor`]. The
//! [`Pipeline`] takes both by injection, owns the per-page state, and tells
//! every registered [`PipelineObserver`] about each change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2png::{write_outputs, Pipeline, PdfiumRasterizer, TesseractExtractor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut pipeline = Pipeline::builder()
//!         .rasterizer(Arc::new(PdfiumRasterizer::new()))
//!         .extractor(Arc::new(TesseractExtractor::default()))
//!         .build();
//!
//!     let summary = pipeline.process_input("report.pdf").await?;
//!     write_outputs(pipeline.records(), "out/").await?;
//!     eprintln!("{} pages, {} with text", summary.pages, summary.completed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Engines
//!
//! | Extractor | Needs | Notes |
//! |-----------|-------|-------|
//! | [`TesseractExtractor`] | `tesseract` on `PATH` | Local, free, one process per page |
//! | [`VisionExtractor`]    | an API key (`OPENAI_API_KEY`, …) or Ollama | Better on messy scans |
//!
//! pdfium is located through `PDFIUM_LIB_PATH`, the working directory, or the
//! system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PipelineConfig, PipelineConfigBuilder, TesseractConfig, VisionConfig, DEFAULT_SCALE,
    MAX_SCALE, MIN_SCALE,
};
pub use controller::{CancelHandle, Pipeline, PipelineBuilder, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
pub use error::{ErrorKind, ExtractionError, PipelineError};
pub use export::{write_outputs, ExportedPage};
pub use output::{
    page_filename, OverallStatus, PageImage, PageRecord, PageStatus, RunSummary, Snapshot,
};
pub use pipeline::input::{resolve_input, Document};
pub use pipeline::llm::VisionExtractor;
pub use pipeline::ocr::{PageTextExtractor, TesseractExtractor};
pub use pipeline::postprocess::clean_text;
pub use pipeline::render::{DocumentRasterizer, PdfiumRasterizer, RasterOptions, RasterPage};
pub use progress::{NoopObserver, PipelineEvent, PipelineObserver, SharedObserver};
pub use stream::{process_input_stream, process_stream, EventStream, StreamedRun};

//! Error types for the pdf2png library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the document cannot be converted at all
//!   (rasterizer missing, unreadable input, corrupt PDF, a page that pdfium
//!   cannot render). The pipeline records it as the overall status and
//!   returns it from [`crate::Pipeline::process_document`].
//!
//! * [`ExtractionError`] — **Non-fatal**: text extraction failed for one
//!   page. It is stored on that page's [`crate::output::PageRecord`] and never
//!   aborts the other pages.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::output::PageStatus;

/// All fatal errors returned by the pdf2png library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required engine is unavailable (no rasterizer injected, pdfium
    /// could not be bound).
    #[error("PDF library not loaded: {0}")]
    Configuration(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The bytes were read, but they do not start with `%PDF`.
    #[error("'{name}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Load / render errors ──────────────────────────────────────────────
    /// The document could not be parsed.
    #[error("Could not load '{name}': {detail}")]
    Load { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("'{name}' is encrypted and requires a password")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for '{name}'")]
    WrongPassword { name: String },

    /// One page could not be rasterised; the whole conversion is abandoned.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Internal errors ───────────────────────────────────────────────────
    /// A page record was asked to move backwards in its state machine.
    #[error("Page {page}: illegal status transition {from} → {to}")]
    InvalidTransition {
        page: usize,
        from: PageStatus,
        to: PageStatus,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Input,
    Load,
    Render,
    Output,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Input => "input",
            ErrorKind::Load => "load",
            ErrorKind::Render => "render",
            ErrorKind::Output => "output",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl PipelineError {
    /// Map this error onto the taxonomy reported in the overall status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) | PipelineError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            PipelineError::FileNotFound { .. }
            | PipelineError::PermissionDenied { .. }
            | PipelineError::InvalidInput { .. }
            | PipelineError::NotAPdf { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::DownloadTimeout { .. } => ErrorKind::Input,
            PipelineError::Load { .. }
            | PipelineError::PasswordRequired { .. }
            | PipelineError::WrongPassword { .. } => ErrorKind::Load,
            PipelineError::Render { .. } => ErrorKind::Render,
            PipelineError::OutputWriteFailed { .. } => ErrorKind::Output,
            PipelineError::InvalidTransition { .. } | PipelineError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// A non-fatal error for a single page's text extraction.
#[derive(Debug, Clone, Error, Serialize)]
pub enum ExtractionError {
    /// The OCR engine could not be started (binary missing, no provider).
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but reported a failure.
    #[error("Text recognition failed: {0}")]
    RecognitionFailed(String),

    /// The engine did not answer within the configured time.
    #[error("Text recognition timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A vision provider call failed after all retries.
    #[error("Vision provider failed after {retries} retries: {detail}")]
    ProviderFailed { retries: u32, detail: String },

    /// Scratch file handling failed.
    #[error("I/O error during recognition: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExtractionError {
    fn from(e: std::io::Error) -> Self {
        ExtractionError::Io(e.to_string())
    }
}

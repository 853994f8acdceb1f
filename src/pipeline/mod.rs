//! Engine adapters behind the page pipeline.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr / llm ──▶ postprocess
//! (path/URL) (pdfium)  (PNG)     (text)         (cleanup)
//! ```
//!
//! 1. [`input`]  — read a local path, URL, or buffer into a [`input::Document`]
//! 2. [`render`] — the [`render::DocumentRasterizer`] seam and its pdfium
//!    implementation; runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`] — PNG-encode rendered bitmaps; base64-wrap them for vision APIs
//! 4. [`ocr`]    — the [`ocr::PageTextExtractor`] seam and the Tesseract backend
//! 5. [`llm`]    — the vision-model backend with retry/backoff
//! 6. [`postprocess`] — deterministic cleanup of recognised text

pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;

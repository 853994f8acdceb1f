//! PDF rasterisation: render every page to a PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is CPU-bound
//! and not async-aware. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so the controller task keeps publishing events.
//!
//! ## Memory
//!
//! Each page's bitmap is encoded to PNG and dropped before the next page is
//! rendered, so peak memory is one uncompressed page plus the PNGs produced
//! so far.

use crate::config::DEFAULT_SCALE;
use crate::error::PipelineError;
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Options passed to every rasterisation call.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Magnification: page points × scale = output pixels.
    pub scale: f32,
    /// PDF user password.
    pub password: Option<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            password: None,
        }
    }
}

/// One rendered page, PNG-encoded.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Turns document bytes into one PNG per page, in page order.
///
/// The call is all-or-nothing: a page that fails to render fails the whole
/// document with [`PipelineError::Render`] and no pages are returned.
#[async_trait]
pub trait DocumentRasterizer: Send + Sync {
    /// Verify the underlying engine can be used.
    ///
    /// Fails with [`PipelineError::Configuration`] when it cannot.
    fn ensure_ready(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Rasterise every page of `pdf`. `name` is used in error messages.
    async fn rasterize(
        &self,
        name: &str,
        pdf: Vec<u8>,
        options: &RasterOptions,
    ) -> Result<Vec<RasterPage>, PipelineError>;
}

/// Where to find the pdfium shared library.
#[derive(Debug, Clone)]
enum LibrarySource {
    /// `PDFIUM_LIB_PATH`, then the working directory, then the system path.
    Auto,
    /// An explicit library file or a directory containing it.
    Path(PathBuf),
}

/// [`DocumentRasterizer`] backed by pdfium.
///
/// The library is bound lazily on first use and shared by every later call.
pub struct PdfiumRasterizer {
    source: LibrarySource,
    pdfium: OnceCell<Arc<Pdfium>>,
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfiumRasterizer {
    /// Locate pdfium via `PDFIUM_LIB_PATH`, the working directory, or the
    /// system library path, in that order.
    pub fn new() -> Self {
        Self {
            source: LibrarySource::Auto,
            pdfium: OnceCell::new(),
        }
    }

    /// Bind to the library at `path` (a file, or a directory containing the
    /// platform-named library).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: LibrarySource::Path(path.into()),
            pdfium: OnceCell::new(),
        }
    }

    fn pdfium(&self) -> Result<Arc<Pdfium>, PipelineError> {
        self.pdfium
            .get_or_try_init(|| bind(&self.source).map(Arc::new))
            .cloned()
    }
}

#[async_trait]
impl DocumentRasterizer for PdfiumRasterizer {
    fn ensure_ready(&self) -> Result<(), PipelineError> {
        self.pdfium().map(|_| ())
    }

    async fn rasterize(
        &self,
        name: &str,
        pdf: Vec<u8>,
        options: &RasterOptions,
    ) -> Result<Vec<RasterPage>, PipelineError> {
        let pdfium = self.pdfium()?;
        let name = name.to_string();
        let options = options.clone();

        tokio::task::spawn_blocking(move || rasterize_blocking(&pdfium, &name, &pdf, &options))
            .await
            .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn bind(source: &LibrarySource) -> Result<Pdfium, PipelineError> {
    let bindings = match source {
        LibrarySource::Path(path) => bind_path(path)?,
        LibrarySource::Auto => match std::env::var_os("PDFIUM_LIB_PATH") {
            Some(p) => bind_path(Path::new(&p))?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| {
                    PipelineError::Configuration(format!(
                        "pdfium not found on the system library path ({e:?}); set PDFIUM_LIB_PATH"
                    ))
                })?,
        },
    };
    info!("Bound pdfium library");
    Ok(Pdfium::new(bindings))
}

fn bind_path(path: &Path) -> Result<Box<dyn PdfiumLibraryBindings>, PipelineError> {
    let lib = if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    };
    Pdfium::bind_to_library(&lib).map_err(|e| {
        PipelineError::Configuration(format!("cannot bind pdfium at '{}': {e:?}", lib.display()))
    })
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    pdfium: &Pdfium,
    name: &str,
    pdf: &[u8],
    options: &RasterOptions,
) -> Result<Vec<RasterPage>, PipelineError> {
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, options.password.as_deref())
        .map_err(|e| classify_load_error(name, options.password.is_some(), format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new().scale_page_by_factor(options.scale);
    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PipelineError::Render {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        drop(bitmap);

        let png = encode_png(&image).map_err(|e| PipelineError::Render {
            page: page_num,
            detail: format!("PNG encoding failed: {}", e),
        })?;
        debug!(
            "Rendered page {} → {}x{} px, {} bytes",
            page_num,
            image.width(),
            image.height(),
            png.len()
        );

        results.push(RasterPage {
            width: image.width(),
            height: image.height(),
            png,
        });
    }

    Ok(results)
}

/// pdfium reports password problems through its generic error; tell them
/// apart from corruption by the message.
fn classify_load_error(name: &str, had_password: bool, detail: String) -> PipelineError {
    if detail.to_lowercase().contains("password") {
        if had_password {
            PipelineError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            PipelineError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        PipelineError::Load {
            name: name.to_string(),
            detail,
        }
    }
}

//! Page text extraction: the [`PageTextExtractor`] seam and a Tesseract backend.
//!
//! Every call is self-contained: engine start-up, language loading,
//! recognition, and teardown all happen inside one `extract_text` call, so
//! pages are independent and one failure never poisons the next page.

use crate::config::TesseractConfig;
use crate::error::ExtractionError;
use crate::output::PageImage;
use crate::pipeline::postprocess::clean_text;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::process::Command;
use tracing::debug;

/// Recognises the text on one page image.
///
/// An empty string is a successful result (the page has no text).
#[async_trait]
pub trait PageTextExtractor: Send + Sync {
    /// Short engine name for logs, e.g. `tesseract`.
    fn name(&self) -> &str;

    async fn extract_text(&self, image: &PageImage) -> Result<String, ExtractionError>;
}

/// Runs the `tesseract` command-line program once per page.
pub struct TesseractExtractor {
    config: TesseractConfig,
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl TesseractExtractor {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn command(&self, image_path: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language]);
        if let Some(ref dir) = self.config.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PageTextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn extract_text(&self, image: &PageImage) -> Result<String, ExtractionError> {
        let start = Instant::now();

        // tesseract reads from a path; the file is removed when `scratch` drops.
        let scratch = scratch_png().await?;
        tokio::fs::write(&scratch, image.png()).await?;

        let secs = self.config.timeout_secs;
        let run = self.command(&scratch).output();
        let output = match tokio::time::timeout(Duration::from_secs(secs), run).await {
            Err(_) => return Err(ExtractionError::Timeout { secs }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractionError::EngineUnavailable(format!(
                    "'{}' not found (install tesseract-ocr)",
                    self.config.binary.display()
                )))
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::RecognitionFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = clean_text(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "Page {}: tesseract produced {} chars in {:?}",
            image.page_num,
            text.len(),
            start.elapsed()
        );
        Ok(text)
    }
}

/// Reserve an empty `pdf2png-*.png` in the temp directory.
async fn scratch_png() -> Result<TempPath, ExtractionError> {
    tokio::task::spawn_blocking(|| {
        tempfile::Builder::new()
            .prefix("pdf2png-")
            .suffix(".png")
            .tempfile()
            .map(|f| f.into_temp_path())
    })
    .await
    .map_err(|e| ExtractionError::Io(format!("scratch file task failed: {e}")))?
    .map_err(ExtractionError::from)
}

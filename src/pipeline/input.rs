//! Input resolution: turn a user-supplied path, URL, or buffer into a [`Document`].
//!
//! pdfium can rasterise straight from memory, so every source is read fully
//! into a byte buffer. Local files and downloads are checked for the `%PDF`
//! magic bytes up front so callers get a meaningful error rather than a
//! pdfium parse failure.

use crate::error::PipelineError;
use std::path::Path;
use tracing::{debug, info};

/// Raw bytes of one source document plus the name its pages are named after.
///
/// Immutable once read. The pipeline moves the bytes into the rasterizer and
/// drops them when rasterisation finishes.
#[derive(Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap bytes that are already in memory. No validation is done here;
    /// an unparsable buffer surfaces as a load error during rasterisation.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a local file, validating existence, permissions, and PDF magic.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied { path: path.clone() },
            _ => PipelineError::FileNotFound { path: path.clone() },
        })?;

        let name = file_name(&path);
        check_magic(&name, &bytes)?;
        debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { name, bytes })
    }

    /// Download a PDF over HTTP(S).
    pub async fn download(url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        info!("Downloading PDF from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                PipelineError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .to_vec();

        let name = filename_from_url(url);
        check_magic(&name, &bytes)?;
        info!("Downloaded {} ({} bytes)", name, bytes.len());
        Ok(Self { name, bytes })
    }

    /// Source name, e.g. `report.pdf`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Split into name and bytes, consuming the document.
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.name, self.bytes)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read `input` as a URL when it has an http(s) scheme, otherwise as a path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, PipelineError> {
    if input.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        Document::download(input, timeout_secs).await
    } else {
        Document::from_path(input).await
    }
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PipelineError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Last non-empty path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

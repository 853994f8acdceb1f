//! Configuration types for the page pipeline and its OCR engines.
//!
//! [`PipelineConfig`] carries the knobs the controller itself uses and is
//! built through [`PipelineConfigBuilder`], which validates ranges.
//! [`TesseractConfig`] and [`VisionConfig`] configure the two bundled text
//! extractors; both are plain structs with sensible defaults.

use crate::error::PipelineError;
use edgequake_llm::LLMProvider;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default magnification applied when rasterising pages.
///
/// Page size in PDF points × scale = output pixels, so an A4 page
/// (595 × 842 pt) renders at 893 × 1263 px.
pub const DEFAULT_SCALE: f32 = 1.5;

/// Smallest accepted scale factor.
pub const MIN_SCALE: f32 = 0.1;

/// Largest accepted scale factor.
pub const MAX_SCALE: f32 = 10.0;

/// Configuration for one [`crate::Pipeline`].
///
/// # Example
/// ```rust
/// use pdf2png::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .scale(2.0)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.scale, 2.0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Rasterisation magnification. Range: 0.1–10.0. Default: 1.5.
    pub scale: f32,

    /// Maximum number of pages whose text is extracted at the same time.
    /// Default: 1 (strictly sequential, one page `processing` at a time).
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    #[serde(skip)]
    pub password: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            concurrency: 1,
            password: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if !c.scale.is_finite() || c.scale < MIN_SCALE || c.scale > MAX_SCALE {
            return Err(PipelineError::InvalidConfig(format!(
                "scale must be {MIN_SCALE}–{MAX_SCALE}, got {}",
                c.scale
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Settings for [`crate::pipeline::ocr::TesseractExtractor`].
#[derive(Debug, Clone, Serialize)]
pub struct TesseractConfig {
    /// Executable to run. Default: `tesseract` (resolved on `PATH`).
    pub binary: PathBuf,

    /// Language model(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub language: String,

    /// Directory holding `*.traineddata`; passed as `--tessdata-dir`.
    pub tessdata_dir: Option<PathBuf>,

    /// Per-page wall-clock limit in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
            timeout_secs: 120,
        }
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────

/// Settings for [`crate::pipeline::llm::VisionExtractor`].
#[derive(Clone)]
pub struct VisionConfig {
    /// Model identifier, e.g. "gpt-4.1-nano". If None, uses "gpt-4.1-nano".
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (verbatim transcription).
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed provider call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom transcription prompt. If None, uses [`crate::prompts::DEFAULT_OCR_PROMPT`].
    pub system_prompt: Option<String>,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

//! Vision-LLM OCR backend: send the page image to a multimodal model and
//! read back the transcription.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) spreads retries out: with 500 ms base and
//! 3 retries the wait sequence is 500 ms → 1 s → 2 s. The retries live here,
//! inside one `extract_text` call; the pipeline controller never retries.

use crate::config::VisionConfig;
use crate::error::{ExtractionError, PipelineError};
use crate::output::PageImage;
use crate::pipeline::encode::to_image_data;
use crate::pipeline::ocr::PageTextExtractor;
use crate::pipeline::postprocess::clean_text;
use crate::prompts::{DEFAULT_OCR_PROMPT, OCR_USER_MESSAGE};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// [`PageTextExtractor`] that asks a vision model to transcribe each page.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    config: VisionConfig,
}

impl VisionExtractor {
    /// Use an already-constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: VisionConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve the provider from `config`, then the environment.
    ///
    /// Order: `config.provider` → `config.provider_name` (+ `model`) →
    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` → `OPENAI_API_KEY` →
    /// [`ProviderFactory::from_env`].
    pub fn from_config(config: VisionConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(&config)?;
        Ok(Self { provider, config })
    }
}

#[async_trait]
impl PageTextExtractor for VisionExtractor {
    fn name(&self) -> &str {
        "vision"
    }

    async fn extract_text(&self, image: &PageImage) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let page_num = image.page_num;
        let messages = build_messages(&self.config, image);
        let options = build_options(&self.config);
        let per_call = Duration::from_secs(self.config.api_timeout_secs);

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = self.config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(per_call, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens, {:?}",
                        page_num,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(clean_text(&response.content));
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    warn!(
                        "Page {}: attempt {} timed out after {}s",
                        page_num,
                        attempt + 1,
                        self.config.api_timeout_secs
                    );
                    last_err = Some(format!("timed out after {}s", self.config.api_timeout_secs));
                }
            }
        }

        Err(ExtractionError::ProviderFailed {
            retries: self.config.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// System prompt, then one user turn carrying the page image.
fn build_messages(config: &VisionConfig, image: &PageImage) -> Vec<ChatMessage> {
    let system_prompt = config.system_prompt.as_deref().unwrap_or(DEFAULT_OCR_PROMPT);
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(OCR_USER_MESSAGE, vec![to_image_data(image.png())]),
    ]
}

fn build_options(config: &VisionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn resolve_provider(config: &VisionConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        PipelineError::Configuration(format!(
            "no vision OCR provider could be auto-detected; set OPENAI_API_KEY, \
             ANTHROPIC_API_KEY, or pass --provider ({e})"
        ))
    })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::Configuration(format!("vision provider '{provider_name}' is not configured: {e}"))
    })
}

//! Configuration types for a transcription batch.
//!
//! All batch behaviour is controlled through [`TranscriptionConfig`], built
//! via its [`TranscriptionConfigBuilder`]. The API key lives here and is
//! handed to the recognition client at construction; the library never reads
//! it from the environment on its own.

use crate::error::HandscriptError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default Gemini REST endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Body text substituted for a page whose recognition failed.
pub const DEFAULT_PLACEHOLDER: &str = "[OCR failed]";

/// Upload size cap: 50 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for a transcription batch.
///
/// Built via [`TranscriptionConfig::builder()`] or using
/// [`TranscriptionConfig::default()`].
///
/// # Example
/// ```rust
/// use handscript::{PageFailurePolicy, TranscriptionConfig};
///
/// let config = TranscriptionConfig::builder()
///     .api_key("AIza-example")
///     .dpi(200)
///     .page_failure_policy(PageFailurePolicy::AbortFile)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Credential for the Gemini backend. Required by [`crate::GeminiClient::new`].
    pub api_key: Option<String>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// REST endpoint root, without a trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 200.
    ///
    /// Handwriting needs more pixels than print; 200 DPI keeps strokes legible
    /// while a full A4 page stays around 1650 × 2340 px.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// Recognition calls in flight per file. Default: 1 (sequential).
    ///
    /// Results are always reassembled in page order.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Extra attempts after the first failed recognition call. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom instruction prompt. If None, uses [`crate::prompts::DEFAULT_PROMPT`].
    pub prompt: Option<String>,

    /// What happens to a file when one of its pages fails. Default: placeholder.
    pub page_failure_policy: PageFailurePolicy,

    /// Body text for failed pages under [`PageFailurePolicy::Placeholder`].
    pub placeholder: String,

    /// Uploads larger than this are rejected. Default: 50 MiB.
    pub max_file_bytes: u64,

    /// Explicit pdfium library (file or directory). If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Output document template.
    pub document: DocumentOptions,

    /// Receives batch, file and page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            dpi: 200,
            max_rendered_pixels: 3000,
            concurrency: 1,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            prompt: None,
            page_failure_policy: PageFailurePolicy::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            pdfium_library_path: None,
            document: DocumentOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("page_failure_policy", &self.page_failure_policy)
            .field("placeholder", &self.placeholder)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("document", &self.document)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction prompt sent with every page.
    pub fn prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_PROMPT)
    }
}

/// Builder for [`TranscriptionConfig`].
#[derive(Debug)]
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl TranscriptionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.config.page_failure_policy = policy;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.config.placeholder = text.into();
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn document(mut self, options: DocumentOptions) -> Self {
        self.config.document = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, HandscriptError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(HandscriptError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(HandscriptError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(HandscriptError::InvalidConfig(
                "API timeout must be at least one second".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(HandscriptError::InvalidConfig("Model must not be empty".into()));
        }
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(HandscriptError::InvalidConfig(format!(
                "Base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the orchestrator does when one page of a file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Keep going; the failed page's body becomes the placeholder text. (default)
    #[default]
    Placeholder,
    /// Fail the whole file on the first page error. Later files still run.
    AbortFile,
}

/// Template knobs for the generated Word document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    /// Title paragraph at the top of the document. None disables it.
    pub title: Option<String>,

    /// Add a "Processed at" line under each section heading.
    pub include_timestamp: bool,

    /// Append a note that the text is machine-recognised.
    pub include_notice: bool,

    /// Font applied to every run (ASCII and East Asian slots).
    pub font_family: String,

    /// Body font size in points.
    pub font_size_pt: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: Some("Handwritten Questionnaire Transcription".to_string()),
            include_timestamp: false,
            include_notice: true,
            font_family: "MS Gothic".to_string(),
            font_size_pt: 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential_single_attempt() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.api_timeout_secs, 60);
        assert_eq!(config.placeholder, "[OCR failed]");
        assert_eq!(config.page_failure_policy, PageFailurePolicy::Placeholder);
    }

    #[test]
    fn builder_clamps_values() {
        let config = TranscriptionConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .temperature(9.0)
            .build()
            .expect("clamped values are valid");
        assert_eq!(config.dpi, 600);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_bad_base_url() {
        let err = TranscriptionConfig::builder()
            .base_url("ftp://example.org")
            .build()
            .unwrap_err();
        assert!(matches!(err, HandscriptError::InvalidConfig(_)));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let config = TranscriptionConfig::builder()
            .base_url("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1beta");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = TranscriptionConfig::builder()
            .api_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn custom_prompt_overrides_default() {
        let config = TranscriptionConfig::builder().prompt("read it").build().unwrap();
        assert_eq!(config.prompt(), "read it");
        assert_eq!(
            TranscriptionConfig::default().prompt(),
            crate::prompts::DEFAULT_PROMPT
        );
    }
}

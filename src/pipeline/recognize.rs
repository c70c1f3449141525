//! Recognition: send one page image to the multimodal service and get text.
//!
//! [`Recognizer`] is the seam between the orchestrator and a concrete
//! backend ([`crate::GeminiClient`] or [`crate::ProviderRecognizer`]). It is
//! object-safe so a batch can hold an `Arc<dyn Recognizer>` chosen at runtime.
//!
//! ## Retry Strategy
//!
//! By default each page gets exactly one call (`max_retries = 0`). When
//! retries are enabled the wait doubles per attempt
//! (`retry_backoff_ms * 2^(attempt-1)`), and credential or quota failures
//! are never retried.

use crate::config::TranscriptionConfig;
use crate::error::{PageError, RecognitionError};
use crate::output::PageTranscript;
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::postprocess::clean_transcript;
use futures::future::BoxFuture;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Raw result of one successful recognition call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Recognition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A multimodal recognition backend.
pub trait Recognizer: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Transcribe one page image using `prompt` as the instruction.
    fn recognize<'a>(
        &'a self,
        page: &'a EncodedPage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Recognition, RecognitionError>>;
}

/// Recognise one page, retrying per the config, and clean up the text.
///
/// Returns the finished transcript or the page error after the last attempt.
/// A response that is empty after post-processing counts as
/// [`RecognitionError::EmptyResponse`].
pub async fn recognize_page(
    recognizer: &dyn Recognizer,
    page: &EncodedPage,
    prompt: &str,
    config: &TranscriptionConfig,
) -> Result<PageTranscript, PageError> {
    let start = Instant::now();
    let page_num = page.page_num;
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let result = recognizer.recognize(page, prompt).await.and_then(|r| {
            let text = clean_transcript(&r.text);
            if text.is_empty() {
                Err(RecognitionError::EmptyResponse)
            } else {
                Ok((text, r))
            }
        });

        match result {
            Ok((text, raw)) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, raw.input_tokens, raw.output_tokens, duration
                );
                return Ok(PageTranscript {
                    page_num,
                    text,
                    input_tokens: raw.input_tokens,
                    output_tokens: raw.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                    error: None,
                });
            }
            Err(e) => {
                warn!(
                    "Page {}: attempt {} via {} failed: {}",
                    page_num,
                    attempt + 1,
                    recognizer.name(),
                    e
                );
                if attempt >= config.max_retries || !e.is_retryable() {
                    return Err(PageError::RecognitionFailed {
                        page: page_num,
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }
        attempt += 1;
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

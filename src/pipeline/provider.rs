//! Alternative backend: any vision-capable `edgequake_llm` provider.
//!
//! The prompt travels as the system message and the page as an image
//! attachment on an empty user turn. Provider errors arrive as opaque
//! messages, so they are classified by the status hints they carry.

use crate::config::TranscriptionConfig;
use crate::error::{HandscriptError, RecognitionError};
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::recognize::{Recognition, Recognizer};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// [`Recognizer`] backed by an `edgequake_llm` provider.
pub struct ProviderRecognizer {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl ProviderRecognizer {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &TranscriptionConfig) -> Self {
        Self {
            label: "provider".to_string(),
            provider,
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Create a named provider (`openai`, `anthropic`, `ollama`, …) with
    /// `config.model`. The factory reads that provider's key from the
    /// environment.
    pub fn from_name(name: &str, config: &TranscriptionConfig) -> Result<Self, HandscriptError> {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            HandscriptError::MissingCredential {
                backend: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        let mut recognizer = Self::new(provider, config);
        recognizer.label = format!("provider:{name}");
        Ok(recognizer)
    }

    async fn chat(&self, page: &EncodedPage, prompt: &str) -> Result<Recognition, RecognitionError> {
        let image = ImageData::new(page.data.clone(), page.mime_type.as_str()).with_detail("high");
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let call = self.provider.chat(&messages, Some(&self.options));
        let response = timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| RecognitionError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| classify_provider_error(&e.to_string()))?;

        Ok(Recognition {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

impl Recognizer for ProviderRecognizer {
    fn name(&self) -> &str {
        &self.label
    }

    fn recognize<'a>(
        &'a self,
        page: &'a EncodedPage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Recognition, RecognitionError>> {
        Box::pin(self.chat(page, prompt))
    }
}

/// Classify an opaque provider error message.
fn classify_provider_error(message: &str) -> RecognitionError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
    {
        RecognitionError::Authentication(message.to_string())
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
        RecognitionError::RateLimited(message.to_string())
    } else if lower.contains("timed out") || lower.contains("timeout") {
        RecognitionError::Network(message.to_string())
    } else {
        RecognitionError::Service {
            status: 0,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_and_quota() {
        assert!(matches!(
            classify_provider_error("HTTP 401 Unauthorized: invalid api key"),
            RecognitionError::Authentication(_)
        ));
        assert!(matches!(
            classify_provider_error("Rate limit reached for requests"),
            RecognitionError::RateLimited(_)
        ));
        assert!(matches!(
            classify_provider_error("model overloaded"),
            RecognitionError::Service { status: 0, .. }
        ));
    }
}

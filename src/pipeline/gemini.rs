//! Gemini REST backend: `models/{model}:generateContent` over reqwest.
//!
//! One request per page: the instruction text and the page PNG travel as two
//! parts of a single user turn. The API key goes in the `x-goog-api-key`
//! header so it never appears in a URL that might be logged.

use crate::config::TranscriptionConfig;
use crate::error::{HandscriptError, RecognitionError};
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::recognize::{Recognition, Recognizer};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Recognition client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Build a client from the batch config.
    ///
    /// Fails with [`HandscriptError::MissingCredential`] when no API key is set.
    pub fn new(config: &TranscriptionConfig) -> Result<Self, HandscriptError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| HandscriptError::MissingCredential {
                backend: "gemini".into(),
                hint: "Set GEMINI_API_KEY or pass an API key in the configuration.".into(),
            })?
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| HandscriptError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/models/{}:generateContent", config.base_url, config.model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body<'a>(&self, page: &'a EncodedPage, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &page.mime_type,
                            data: &page.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }

    async fn generate(
        &self,
        page: &EncodedPage,
        prompt: &str,
    ) -> Result<Recognition, RecognitionError> {
        let body = self.request_body(page, prompt);
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!("Page {}: Gemini HTTP {} ({} bytes)", page.page_num, status, text.len());

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &text));
        }
        parse_response(&text)
    }

    fn transport_error(&self, e: reqwest::Error) -> RecognitionError {
        if e.is_timeout() {
            RecognitionError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            RecognitionError::Network(e.to_string())
        }
    }
}

impl Recognizer for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn recognize<'a>(
        &'a self,
        page: &'a EncodedPage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<Recognition, RecognitionError>> {
        Box::pin(self.generate(page, prompt))
    }
}

// ── Wire schema ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

/// Gemini answers a bad key with 400 `INVALID_ARGUMENT`, not 401.
fn is_invalid_key(message: &str, reasons: &[String]) -> bool {
    reasons.iter().any(|r| r == "API_KEY_INVALID") || message.contains("API key not valid")
}

/// Extract the text of the first candidate from a success body.
///
/// Text parts are concatenated in order. A body with no candidates and a
/// block reason is reported as malformed; one with no text yields an empty
/// [`Recognition`], which the retry loop treats as an empty response.
pub(crate) fn parse_response(body: &str) -> Result<Recognition, RecognitionError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| RecognitionError::MalformedResponse(e.to_string()))?;

    if parsed.candidates.is_empty() {
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(RecognitionError::MalformedResponse(format!(
                "request blocked: {reason}"
            )));
        }
    }

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or((0, 0));

    Ok(Recognition {
        text,
        input_tokens,
        output_tokens,
    })
}

/// Map a non-success status and its body to a [`RecognitionError`].
pub(crate) fn classify_failure(status: u16, body: &str) -> RecognitionError {
    let (message, api_status, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (
            env.error.message,
            env.error.status,
            env.error
                .details
                .into_iter()
                .filter_map(|d| d.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.chars().take(200).collect(), String::new(), Vec::new()),
    };

    match status {
        401 | 403 => RecognitionError::Authentication(message),
        _ if is_invalid_key(&message, &reasons) => RecognitionError::Authentication(message),
        429 => RecognitionError::RateLimited(message),
        _ if api_status == "RESOURCE_EXHAUSTED" => RecognitionError::RateLimited(message),
        _ if api_status == "UNAUTHENTICATED" || api_status == "PERMISSION_DENIED" => {
            RecognitionError::Authentication(message)
        }
        _ => RecognitionError::Service { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn page() -> EncodedPage {
        EncodedPage {
            page_num: 1,
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let len = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + len || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (base, handle)
    }

    fn client(base_url: &str, key: Option<&str>) -> Result<GeminiClient, HandscriptError> {
        let mut b = TranscriptionConfig::builder().base_url(base_url);
        if let Some(k) = key {
            b = b.api_key(k);
        }
        GeminiClient::new(&b.build().unwrap())
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = client("https://example.org", None).err().unwrap();
        assert!(matches!(err, HandscriptError::MissingCredential { .. }));
        let err = client("https://example.org", Some("   ")).err().unwrap();
        assert!(matches!(err, HandscriptError::MissingCredential { .. }));
    }

    #[test]
    fn endpoint_includes_model() {
        let c = client("https://example.org/v1beta", Some("k")).unwrap();
        assert_eq!(
            c.endpoint(),
            "https://example.org/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
    }

    #[test]
    fn request_body_shape() {
        let c = client("https://example.org", Some("k")).unwrap();
        let p = page();
        let json = serde_json::to_value(c.request_body(&p, "transcribe")).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "transcribe");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["data"],
            "iVBORw0KGgo="
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "Q1: "}, {"text": "はい"}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 8}
        }"#;
        let r = parse_response(body).unwrap();
        assert_eq!(r.text, "Q1: はい");
        assert_eq!(r.input_tokens, 1200);
        assert_eq!(r.output_tokens, 8);
    }

    #[test]
    fn no_candidates_is_empty_text() {
        let r = parse_response(r#"{"candidates": []}"#).unwrap();
        assert!(r.text.is_empty());
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let err = parse_response(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, RecognitionError::MalformedResponse(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_response("<html>oops</html>"),
            Err(RecognitionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn failure_classification() {
        let quota = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            classify_failure(429, quota),
            RecognitionError::RateLimited("Quota exceeded".into())
        );

        let bad_key = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_failure(400, bad_key),
            RecognitionError::Authentication(_)
        ));

        let bad_request = r#"{"error": {"code": 400, "message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_failure(400, bad_request),
            RecognitionError::Service { status: 400, .. }
        ));
        assert!(matches!(
            classify_failure(403, bad_key),
            RecognitionError::Authentication(_)
        ));

        assert_eq!(
            classify_failure(503, "upstream down"),
            RecognitionError::Service {
                status: 503,
                message: "upstream down".into()
            }
        );
    }

    #[test]
    fn invalid_key_reason_is_authentication() {
        let body = r#"{"error": {"code": 400, "message": "Request rejected", "status": "INVALID_ARGUMENT",
            "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID", "domain": "googleapis.com"}]}}"#;
        let err = classify_failure(400, body);
        assert_eq!(err, RecognitionError::Authentication("Request rejected".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn round_trip_against_local_server() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Q1: 満足"}]}}],"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2}}"#,
        )
        .await;
        let c = client(&base, Some("test-key")).unwrap();
        let r = c.recognize(&page(), "read this").await.unwrap();
        assert_eq!(r.text, "Q1: 満足");
        assert_eq!(r.output_tokens, 2);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-2.5-flash-lite:generateContent"));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
        assert!(request.contains("\"inlineData\""));
    }

    #[tokio::test]
    async fn http_error_is_classified() {
        let (base, server) = serve_once(
            "401 Unauthorized",
            r#"{"error":{"code":401,"message":"bad credentials","status":"UNAUTHENTICATED"}}"#,
        )
        .await;
        let c = client(&base, Some("wrong")).unwrap();
        let err = c.recognize(&page(), "read this").await.unwrap_err();
        assert_eq!(err, RecognitionError::Authentication("bad credentials".into()));
        server.await.unwrap();
    }
}

//! Vision Client: the single point of entry for all model API calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All vision-model interactions MUST go through this module.
//!
//! Sampling is deterministic (temperature 0) so the same photo yields the
//! same commentary. Transport failures and 5xx responses are retried exactly
//! once; 4xx responses (auth, quota, content policy) are never retried.

use std::future::Future;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::envelope::AnalysisKind;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all vision calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.0;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY_MS: u64 = 500;

/// Terminal failure of a model call, after the single internal retry.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Network error, timeout, or 5xx. Retried once before surfacing.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// 4xx from the API: bad key, quota, or content policy. Never retried.
    #[error("upstream rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// One image attached to a model call.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub media_type: String,
    pub data: Bytes,
}

/// Input to a single model call. Carries one image for a single-photo
/// analysis, two (earlier first) for a comparison.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub kind: AnalysisKind,
    pub images: Vec<ImagePayload>,
    pub subject_context: Option<String>,
}

/// Raw model output before any parsing. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct RawModelResponse {
    pub text: String,
    pub model: String,
    pub temperature: f32,
    pub requested_at: DateTime<Utc>,
}

/// The seam between the analysis pipeline and the real model API.
/// Carried in `AppState` as `Arc<dyn UpstreamModel>`.
#[async_trait]
pub trait UpstreamModel: Send + Sync {
    async fn generate(&self, request: &UpstreamRequest) -> Result<RawModelResponse, UpstreamError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: &'static str,
    max_tokens: u32,
    temperature: f32,
    system: &'static str,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ModelResponse {
    /// Text content of the first text block, if any.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Production client for the Anthropic Messages API.
#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    api_key: String,
}

impl VisionClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    fn build_request_body(&self, request: &UpstreamRequest) -> AnthropicRequest {
        let mut content: Vec<ContentPart> = request
            .images
            .iter()
            .map(|image| ContentPart::Image {
                source: ImageSource {
                    source_type: "base64",
                    media_type: image.media_type.clone(),
                    data: BASE64.encode(&image.data),
                },
            })
            .collect();

        content.push(ContentPart::Text {
            text: prompts::fill_prompt(request.kind, request.subject_context.as_deref()),
        });

        AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: prompts::VISION_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        }
    }

    /// One request/response round trip, with failures classified.
    async fn call_once(&self, body: &AnthropicRequest) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = response.status();

        if status.is_server_error() {
            let body_text = response.text().await.unwrap_or_default();
            warn!("Model API returned {status}: {body_text}");
            return Err(UpstreamError::Unavailable(format!("status {status}")));
        }

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body_text)
                .map(|e| e.error.message)
                .unwrap_or(body_text);
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ModelResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("malformed API response: {e}")))?;

        debug!(
            "Model call succeeded: input_tokens={}, output_tokens={}",
            parsed.usage.input_tokens, parsed.usage.output_tokens
        );

        // A response with no text block yields empty text; the extractor
        // downstream turns that into a degraded result, not a failure.
        Ok(parsed.text().unwrap_or_default().to_string())
    }
}

/// The retry policy, applied to one attempt-producing closure. An
/// `Unavailable` outcome gets a second attempt after `RETRY_DELAY_MS`;
/// any other outcome, including `Rejected`, is final on the first attempt.
async fn call_with_retry<T, F, Fut>(mut attempt: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    match attempt().await {
        Err(UpstreamError::Unavailable(reason)) => {
            warn!("Model call failed ({reason}), retrying once after {RETRY_DELAY_MS}ms");
            tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
            attempt().await
        }
        outcome => outcome,
    }
}

#[async_trait]
impl UpstreamModel for VisionClient {
    async fn generate(&self, request: &UpstreamRequest) -> Result<RawModelResponse, UpstreamError> {
        let requested_at = Utc::now();
        let body = self.build_request_body(request);

        let text = call_with_retry(|| self.call_once(&body)).await?;

        Ok(RawModelResponse {
            text,
            model: MODEL.to_string(),
            temperature: TEMPERATURE,
            requested_at,
        })
    }
}

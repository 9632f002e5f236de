//! Client for the generative-language REST API.
//!
//! POSTs to `{base_url}/models/{model}:generate?key=...` and extracts the
//! first candidate's text. A single attempt per call, bounded by the
//! configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use super::InferenceClient;
use crate::config::AssistantConfig;
use crate::error::ApiError;

const TEMPERATURE: f32 = 0.2;
const MAX_OUTPUT_TOKENS: u32 = 256;

/// Maximum length of an error body carried inside `ApiError::Unavailable`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct PromptText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ImageContent<'a> {
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: PromptText<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImageContent<'a>>,
}

/// reqwest-backed inference client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client from configuration. Succeeds without an API key; calls
    /// then fail with `ApiError::MissingCredential`.
    pub fn new(config: &AssistantConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("alfred/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Unavailable {
                status: None,
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.endpoint_base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generate", self.base_url, self.model)
    }

    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        let key = self.api_key.as_ref().ok_or(ApiError::MissingCredential)?;

        tracing::debug!(model = %self.model, timeout = ?timeout, "Sending generate request");

        let response = self
            .http
            .post(self.generate_url())
            .query(&[("key", key.expose_secret())])
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_in_place(&mut body, MAX_ERROR_BODY);
            tracing::warn!(status = status.as_u16(), "Inference endpoint returned an error");
            return Err(ApiError::Unavailable {
                status: Some(status.as_u16()),
                reason: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        let data: Value =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::MalformedResponse {
                reason: format!("body is not JSON: {e}"),
            })?;

        extract_text(&data).ok_or_else(|| ApiError::MalformedResponse {
            reason: "no candidate text in response".into(),
        })
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ask(&self, prompt: &str) -> Result<String, ApiError> {
        let request = GenerateRequest {
            prompt: PromptText { text: prompt },
            temperature: Some(TEMPERATURE),
            max_output_tokens: Some(MAX_OUTPUT_TOKENS),
            image: None,
        };
        self.generate(&request, self.timeout).await
    }

    async fn analyze_image(&self, prompt: &str, image_base64: &str) -> Result<String, ApiError> {
        let request = GenerateRequest {
            prompt: PromptText { text: prompt },
            temperature: None,
            max_output_tokens: None,
            image: Some(ImageContent {
                content: image_base64,
            }),
        };
        // Image uploads get twice the text budget.
        self.generate(&request, self.timeout * 2).await
    }
}

/// Map a reqwest failure to `Unavailable`, stripping the URL (it carries the key).
fn transport_error(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        return ApiError::timeout(timeout);
    }
    ApiError::Unavailable {
        status: err.status().map(|s| s.as_u16()),
        reason: err.without_url().to_string(),
    }
}

/// Extract reply text from the known response shapes:
///
/// - `{"candidates": [{"output": "..."}]}`
/// - `{"candidates": [{"content": "..."}]}`
/// - `{"candidates": [{"content": {"parts": [{"text": "..."}]}}]}`
/// - `{"output": [{"content": "..."}, ...]}` (joined by newline)
pub fn extract_text(data: &Value) -> Option<String> {
    if let Some(first) = data
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    {
        if let Some(output) = first.get("output").and_then(Value::as_str) {
            return Some(output.to_string());
        }
        match first.get("content") {
            Some(Value::String(content)) => return Some(content.clone()),
            Some(content @ Value::Object(_)) => {
                let parts: Vec<&str> = content
                    .get("parts")
                    .and_then(Value::as_array)
                    .map(|parts| parts.iter().filter_map(|p| p.get("text")?.as_str()).collect())
                    .unwrap_or_default();
                if !parts.is_empty() {
                    return Some(parts.concat());
                }
            }
            _ => {}
        }
    }

    let parts: Vec<&str> = data
        .get("output")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|item| item.get("content")?.as_str())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

fn truncate_in_place(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}

//! Inference integration for Alfred.
//!
//! - `gemini`: reqwest client for the generative-language `:generate` endpoint
//! - `fallback`: deterministic local reply used when no remote call is made
//!   or the remote call fails

pub mod fallback;
pub mod gemini;

pub use fallback::fallback;
pub use gemini::GeminiClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AssistantConfig;
use crate::error::ApiError;

/// A remote text-generation backend.
///
/// Implementations make at most one attempt per call; callers decide whether
/// to fall back.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn ask(&self, prompt: &str) -> Result<String, ApiError>;

    /// Generate a completion for `prompt` about a base64-encoded PNG.
    async fn analyze_image(&self, prompt: &str, image_base64: &str) -> Result<String, ApiError>;
}

/// Create the inference client described by `config`.
pub fn create_client(config: &AssistantConfig) -> Result<Arc<dyn InferenceClient>, ApiError> {
    let client = GeminiClient::new(config)?;
    if config.has_api_key() {
        tracing::info!(
            model = %config.model_name,
            endpoint = %config.endpoint_base_url,
            "Using remote inference"
        );
    } else {
        tracing::info!("GOOGLE_API_KEY not set, replies use the local fallback");
    }
    Ok(Arc::new(client))
}

//! Inference client and providers
//!
//! The gateway talks to [`InferenceClient`], which bounds every call with a
//! timeout and delegates to an [`InferenceProvider`]. The OpenAI-compatible
//! provider is the only production implementation.

mod openai;
/// Instruction templates per request kind
pub mod prompts;

pub use openai::OpenAiProvider;

use crate::config::Settings;
use crate::preprocessor::EncodedImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Errors that can occur during inference
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The call did not finish within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The API answered without any content
    #[error("Empty response from model")]
    EmptyResponse,
    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// One chat-completions call: instruction, user text and an optional image
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// System instruction
    pub system: String,
    /// User message text
    pub text: String,
    /// Normalized image sent as a data URL
    pub image: Option<EncodedImage>,
    /// Output token budget
    pub max_tokens: u32,
}

/// Backend able to complete an [`InferenceRequest`]
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Run a chat completion and return the first choice's text
    async fn complete(&self, request: &InferenceRequest, model: &str)
        -> Result<String, LlmError>;
}

/// Timeout-bounded front of an inference provider
#[derive(Clone)]
pub struct InferenceClient {
    provider: Arc<dyn InferenceProvider>,
    model: String,
    timeout: Duration,
}

impl InferenceClient {
    /// Client backed by the OpenAI-compatible API from settings
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let provider = OpenAiProvider::new(&settings.openai_api_key, &settings.openai_api_base);
        Self::with_provider(
            Arc::new(provider),
            settings.openai_model.clone(),
            settings.inference_timeout(),
        )
    }

    /// Client over an arbitrary provider
    #[must_use]
    pub fn with_provider(
        provider: Arc<dyn InferenceProvider>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one request.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Timeout` if the provider does not answer in time,
    /// `LlmError::EmptyResponse` for blank answers, or the provider's error.
    #[instrument(skip(self, request), fields(model = %self.model, max_tokens = request.max_tokens, has_image = request.image.is_some()))]
    pub async fn infer(&self, request: &InferenceRequest) -> Result<String, LlmError> {
        debug!("Sending request to model");
        trace!(system = %request.system, text = %request.text, "Full inference request");

        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.timeout,
            self.provider.complete(request, &self.model),
        )
        .await
        {
            Ok(Ok(text)) if text.trim().is_empty() => Err(LlmError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        };
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                debug!(
                    duration_ms = duration.as_millis(),
                    response_chars = text.chars().count(),
                    "Received response from model"
                );
                trace!(response = %text, "Full inference response");
            }
            Err(e) => warn!(
                duration_ms = duration.as_millis(),
                error = %e,
                "Inference request failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InferenceRequest {
        prompts::question("Where are old coins usually found?")
    }

    #[tokio::test]
    async fn test_infer_passes_model_and_returns_text() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_complete()
            .withf(|req, model| req.max_tokens == prompts::QUESTION_MAX_TOKENS && model == "gpt-4o")
            .times(1)
            .returning(|_, _| Ok("Near old paths.".to_string()));

        let client = InferenceClient::with_provider(Arc::new(provider), "gpt-4o", Duration::from_secs(5));
        let answer = client.infer(&request()).await;

        assert_eq!(answer.ok().as_deref(), Some("Near old paths."));
    }

    #[tokio::test]
    async fn test_blank_answer_is_an_error() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_complete()
            .returning(|_, _| Ok("  \n".to_string()));

        let client = InferenceClient::with_provider(Arc::new(provider), "m", Duration::from_secs(5));
        assert!(matches!(
            client.infer(&request()).await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let mut provider = MockInferenceProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_, _| Err(LlmError::ApiError("500".to_string())));

        let client = InferenceClient::with_provider(Arc::new(provider), "m", Duration::from_secs(5));
        assert!(matches!(
            client.infer(&request()).await,
            Err(LlmError::ApiError(_))
        ));
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl InferenceProvider for Stalled {
        async fn complete(&self, _: &InferenceRequest, _: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let client =
            InferenceClient::with_provider(Arc::new(Stalled), "m", Duration::from_secs(60));
        let result = client.infer(&request()).await;
        assert!(matches!(result, Err(LlmError::Timeout(d)) if d == Duration::from_secs(60)));
    }
}

//! Failures that can end the processing of a single chat event.
//!
//! None of them is fatal: the gateway turns each variant into a user-facing
//! message and carries on with the next event.

use crate::llm::LlmError;
use crate::preprocessor::ImageError;
use thiserror::Error;

/// Error taxonomy of the request pipeline
#[derive(Debug, Error)]
pub enum BotError {
    /// The user exhausted the request quota for the current window
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the next request would be admitted
        retry_after_secs: u64,
    },
    /// The uploaded image could not be accepted
    #[error("unsupported image: {0}")]
    UnsupportedFormat(#[from] ImageError),
    /// The inference API failed or did not answer in time
    #[error("inference unavailable: {0}")]
    InferenceUnavailable(#[from] LlmError),
    /// Telegram download or delivery failed
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl BotError {
    /// Short label used in structured logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::InferenceUnavailable(_) => "inference_unavailable",
            Self::Transport(_) => "transport",
        }
    }
}

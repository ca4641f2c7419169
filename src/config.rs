//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the constants shared by the transport and the inference layer.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_bot_token: String,
    /// API key for the inference provider
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    /// Model identifier used for every request
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Maximum accepted AI requests per user within one window
    #[serde(default = "default_max_requests")]
    pub max_requests_per_minute: usize,
    /// Length of the rate limit window in seconds
    #[serde(default = "default_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Largest accepted upload in megabytes
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: usize,
    /// Longest image side after normalization, in pixels
    #[serde(default = "default_image_max_dimension")]
    pub image_max_dimension: u32,
    /// JPEG quality used when re-encoding uploads
    #[serde(default = "default_image_jpeg_quality")]
    pub image_jpeg_quality: u8,

    /// Upper bound for a single inference call in seconds
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Bot username, used to accept `/command@username` in groups
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
}

fn default_openai_api_base() -> String {
    DEFAULT_OPENAI_API_BASE.to_string()
}

fn default_openai_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS
}

const fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

const fn default_max_image_size_mb() -> usize {
    10
}

const fn default_image_max_dimension() -> u32 {
    1024
}

const fn default_image_jpeg_quality() -> u8 {
    85
}

const fn default_inference_timeout_secs() -> u64 {
    60
}

fn default_bot_username() -> String {
    "treasure_hunter_bot".to_string()
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use treasure_hunter_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a value is invalid.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that credentials are present and limits are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming every offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.telegram_bot_token.trim().is_empty() {
            problems.push("TELEGRAM_BOT_TOKEN is empty");
        }
        if self.openai_api_key.trim().is_empty() {
            problems.push("OPENAI_API_KEY is empty");
        }
        if self.max_requests_per_minute == 0 {
            problems.push("MAX_REQUESTS_PER_MINUTE must be positive");
        }
        if self.rate_limit_window_secs == 0 {
            problems.push("RATE_LIMIT_WINDOW_SECS must be positive");
        }
        if self.image_max_dimension == 0 {
            problems.push("IMAGE_MAX_DIMENSION must be positive");
        }
        if !(1..=100).contains(&self.image_jpeg_quality) {
            problems.push("IMAGE_JPEG_QUALITY must be within 1..=100");
        }
        if self.inference_timeout_secs == 0 {
            problems.push("INFERENCE_TIMEOUT_SECS must be positive");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(problems.join("; ")))
        }
    }

    /// Rate limit window as a `Duration`
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Inference timeout as a `Duration`
    #[must_use]
    pub const fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Upload cap in bytes
    #[must_use]
    pub const fn max_image_bytes(&self) -> usize {
        self.max_image_size_mb * 1024 * 1024
    }
}

/// Default inference endpoint
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default model for every request
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Sampling temperature for all templates
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// Default number of AI requests per user per window
pub const DEFAULT_MAX_REQUESTS: usize = 10;
/// Default rate limit window in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Maximum number of users tracked by the rate limiter at once
pub const RATE_LIMITER_MAX_USERS: u64 = 100_000;

/// Maximum message length for Telegram with safety margin, in UTF-16 code
/// units. Telegram's official limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

// Telegram API retry configuration
/// Maximum attempts for Telegram file and send operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between attempts in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the backoff in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

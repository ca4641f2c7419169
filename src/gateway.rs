//! Event processing pipeline
//!
//! The gateway owns the rate limiter, the inference client and the image
//! preprocessor. For every chat event it routes, checks quota, runs the
//! model and sends the formatted answer through a [`ChatTransport`]. Every
//! failure ends as a message to the user; nothing propagates to the
//! dispatcher.

use crate::config::{Settings, RATE_LIMITER_MAX_USERS, TELEGRAM_MESSAGE_LIMIT};
use crate::error::BotError;
use crate::formatter;
use crate::guide::{self, UsageStats};
use crate::llm::{prompts, InferenceClient, InferenceRequest};
use crate::preprocessor::ImagePreprocessor;
use crate::rate_limiter::{Admission, RateLimiter};
use crate::router::{
    route, Event, QuickAction, RequestEnvelope, StaticReply, Topic, FOLLOW_UP_ACTIONS,
};
use crate::utils::{format_text, truncate_str};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

const ANSWER_HEADER: &str = "💡 **Answer:**";
const SIGNAL_HEADER: &str = "📊 **Signal Analysis:**";
const IMAGE_HEADER: &str = "🔍 **Image Analysis:**";

const fn topic_header(topic: Topic) -> &'static str {
    match topic {
        Topic::Tips => "🎯 **Tips:**",
        Topic::Equipment => "🛠️ **Equipment Advice:**",
        Topic::Legal => "📜 **Legal Guidance:**",
        Topic::Safety => "🛡️ **Safety Advice:**",
    }
}

/// Outbound side of a chat, implemented by the Telegram transport
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Show the "typing" indicator
    async fn send_typing(&self) -> anyhow::Result<()>;

    /// Send one HTML message, optionally with an inline keyboard
    async fn send_html(
        &self,
        html: &str,
        actions: Option<&'static [QuickAction]>,
    ) -> anyhow::Result<()>;

    /// Fetch the bytes of an uploaded photo
    async fn download_photo(&self, file_id: &str) -> anyhow::Result<Vec<u8>>;
}

/// How an event ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A canned reply was sent
    Replied,
    /// A model answer was sent in `chunks` messages
    Answered {
        /// Number of messages the answer was split into
        chunks: usize,
    },
    /// The user was over quota
    Throttled {
        /// Seconds the user was asked to wait
        retry_after_secs: u64,
    },
    /// The uploaded image was refused
    Rejected,
    /// The model failed or timed out
    Unavailable,
    /// Telegram download or delivery failed
    Failed,
}

/// Inference work that passed routing
enum Job {
    Prompt {
        request: InferenceRequest,
        header: &'static str,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
}

/// Request pipeline shared by all chats
pub struct Gateway {
    limiter: RateLimiter,
    inference: InferenceClient,
    preprocessor: ImagePreprocessor,
    chunk_limit: usize,
    answered: AtomicU64,
    started: Instant,
}

impl Gateway {
    /// Build the pipeline from settings, with the OpenAI-compatible provider
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let limiter = RateLimiter::new(
            settings.max_requests_per_minute,
            settings.rate_limit_window(),
            RATE_LIMITER_MAX_USERS,
        );
        let preprocessor = ImagePreprocessor::new(
            settings.max_image_bytes(),
            settings.image_max_dimension,
            settings.image_jpeg_quality,
        );
        Self::new(limiter, InferenceClient::new(settings), preprocessor)
    }

    /// Assemble the pipeline from its parts
    #[must_use]
    pub fn new(
        limiter: RateLimiter,
        inference: InferenceClient,
        preprocessor: ImagePreprocessor,
    ) -> Self {
        Self {
            limiter,
            inference,
            preprocessor,
            chunk_limit: TELEGRAM_MESSAGE_LIMIT,
            answered: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Override the per-message character limit
    #[must_use]
    pub const fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit;
        self
    }

    /// Counters for `/stats`
    #[must_use]
    pub fn stats(&self) -> UsageStats {
        UsageStats {
            tracked_users: self.limiter.tracked_users(),
            answered: self.answered.load(Ordering::Relaxed),
            throttled: self.limiter.denied_count(),
            limit: self.limiter.limit(),
            window: self.limiter.window(),
            uptime: self.started.elapsed(),
        }
    }

    /// Process one event from `user_id` and report how it ended.
    #[instrument(skip(self, transport, event))]
    pub async fn handle(&self, transport: &dyn ChatTransport, user_id: i64, event: Event) -> Outcome {
        let envelope = route(event);
        let kind = envelope.kind();
        let analyzing_image = matches!(envelope, RequestEnvelope::Analyze { .. });

        let result = match envelope {
            RequestEnvelope::Reply(reply) => self.reply(transport, &reply).await,
            RequestEnvelope::Ask(question) => {
                debug!(question = %truncate_str(&question, 80), "Question received");
                let job = Job::Prompt {
                    request: prompts::question(&question),
                    header: ANSWER_HEADER,
                };
                self.answer(transport, user_id, job).await
            }
            RequestEnvelope::Signal(description) => {
                let job = Job::Prompt {
                    request: prompts::signal(&description),
                    header: SIGNAL_HEADER,
                };
                self.answer(transport, user_id, job).await
            }
            RequestEnvelope::TopicQuestion { topic, question } => {
                let job = Job::Prompt {
                    request: prompts::topic_question(topic, &question),
                    header: topic_header(topic),
                };
                self.answer(transport, user_id, job).await
            }
            RequestEnvelope::Analyze { file_id, caption } => {
                self.answer(transport, user_id, Job::Photo { file_id, caption })
                    .await
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => self.report(transport, err, analyzing_image).await,
        };
        info!(kind, ?outcome, "Event handled");
        outcome
    }

    async fn reply(
        &self,
        transport: &dyn ChatTransport,
        reply: &StaticReply,
    ) -> Result<Outcome, BotError> {
        let text = guide::text(reply, &self.stats());
        self.deliver(transport, &text, reply.actions()).await?;
        Ok(Outcome::Replied)
    }

    async fn answer(
        &self,
        transport: &dyn ChatTransport,
        user_id: i64,
        job: Job,
    ) -> Result<Outcome, BotError> {
        let admission = self.limiter.admit(user_id).await;
        if let Admission::Denied { .. } = admission {
            return Err(BotError::RateLimited {
                retry_after_secs: admission.retry_after_secs(),
            });
        }

        self.typing(transport).await;
        let (request, header, follow_up) = match job {
            Job::Prompt { request, header } => (request, header, false),
            Job::Photo { file_id, caption } => {
                let image = self.load_photo(transport, &file_id).await?;
                self.typing(transport).await;
                (
                    prompts::image_analysis(image, caption.as_deref()),
                    IMAGE_HEADER,
                    true,
                )
            }
        };

        let text = self.inference.infer(&request).await?;
        let chunks = self
            .deliver(transport, &format!("{header}\n\n{text}"), None)
            .await?;
        self.answered.fetch_add(1, Ordering::Relaxed);

        if follow_up {
            transport
                .send_html(guide::FOLLOW_UP_PROMPT, Some(FOLLOW_UP_ACTIONS))
                .await?;
        }

        Ok(Outcome::Answered { chunks })
    }

    async fn load_photo(
        &self,
        transport: &dyn ChatTransport,
        file_id: &str,
    ) -> Result<crate::preprocessor::EncodedImage, BotError> {
        let raw = transport.download_photo(file_id).await?;
        let preprocessor = self.preprocessor;
        let image = tokio::task::spawn_blocking(move || preprocessor.normalize(&raw))
            .await
            .map_err(|e| BotError::Transport(anyhow::anyhow!("image worker failed: {e}")))??;
        Ok(image)
    }

    /// Send `text` as HTML chunks; the keyboard goes on the last one.
    async fn deliver(
        &self,
        transport: &dyn ChatTransport,
        text: &str,
        actions: Option<&'static [QuickAction]>,
    ) -> Result<usize, BotError> {
        let messages = formatter::to_html_messages(text, self.chunk_limit);
        let last = messages.len().saturating_sub(1);
        for (i, html) in messages.iter().enumerate() {
            let keyboard = if i == last { actions } else { None };
            transport.send_html(html, keyboard).await?;
        }
        Ok(messages.len())
    }

    async fn typing(&self, transport: &dyn ChatTransport) {
        if let Err(e) = transport.send_typing().await {
            debug!(error = %e, "Failed to send typing indicator");
        }
    }

    async fn report(
        &self,
        transport: &dyn ChatTransport,
        err: BotError,
        analyzing_image: bool,
    ) -> Outcome {
        let (notice, outcome) = match &err {
            BotError::RateLimited { retry_after_secs } => {
                info!(retry_after_secs, "Request throttled");
                (
                    guide::throttled(*retry_after_secs),
                    Outcome::Throttled {
                        retry_after_secs: *retry_after_secs,
                    },
                )
            }
            BotError::UnsupportedFormat(e) => {
                warn!(error = %e, "Rejected image");
                (
                    guide::unsupported_image(self.preprocessor.max_megabytes()),
                    Outcome::Rejected,
                )
            }
            BotError::InferenceUnavailable(_) => (
                guide::apology(analyzing_image).to_string(),
                Outcome::Unavailable,
            ),
            BotError::Transport(_) => (
                guide::apology(analyzing_image).to_string(),
                Outcome::Failed,
            ),
        };

        if matches!(outcome, Outcome::Unavailable | Outcome::Failed) {
            error!(kind = err.kind(), error = %err, "Request failed");
        }

        if let Err(e) = transport.send_html(&format_text(&notice), None).await {
            error!(error = %e, "Failed to deliver error notice");
            return Outcome::Failed;
        }
        outcome
    }
}

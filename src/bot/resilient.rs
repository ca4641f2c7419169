//! Message sending with retry on transient failures.
//!
//! Telegram rejects HTML it cannot parse with a permanent error; those
//! messages are re-sent once as plain text instead of being retried.

use crate::utils::{retry_telegram_operation, strip_html};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, ParseMode};
use tracing::warn;

const ERROR_CANT_PARSE: &str = "can't parse entities";

/// True for Bot API errors caused by malformed HTML
#[must_use]
pub fn is_parse_error(err: &anyhow::Error) -> bool {
    err.to_string().contains(ERROR_CANT_PARSE)
}

/// Send a message with optional parse mode and keyboard, retrying on failure.
///
/// # Errors
///
/// Returns the last Telegram error once retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    parse_mode: Option<ParseMode>,
    keyboard: Option<&InlineKeyboardMarkup>,
) -> Result<Message> {
    retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text);
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(markup) = keyboard {
            req = req.reply_markup(markup.clone());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Send HTML, falling back to the stripped plain text if Telegram refuses
/// to parse it.
///
/// # Errors
///
/// Returns an error if both the HTML and the plain-text attempt fail.
pub async fn send_html_resilient(
    bot: &Bot,
    chat_id: ChatId,
    html: &str,
    keyboard: Option<&InlineKeyboardMarkup>,
) -> Result<Message> {
    match send_message_resilient(bot, chat_id, html, Some(ParseMode::Html), keyboard).await {
        Err(e) if is_parse_error(&e) => {
            warn!(chat_id = chat_id.0, error = %e, "HTML rejected, resending as plain text");
            send_message_resilient(bot, chat_id, &strip_html(html), None, keyboard).await
        }
        other => other,
    }
}

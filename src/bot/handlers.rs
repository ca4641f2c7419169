//! Dispatcher endpoints: translate Telegram updates into gateway events.
//!
//! Every endpoint returns `respond(())`; failures have already been turned
//! into user-facing messages by the gateway.

use super::TelegramTransport;
use crate::config::Settings;
use crate::gateway::Gateway;
use crate::router::Event;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

/// File extensions treated as images when a document has no MIME type
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff", "heic", "heif", "avif",
];

/// Rate-limit key of the sender: the user id, or the chat id for messages
/// without a user (channel posts, anonymous admins).
#[must_use]
pub fn sender_key(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .map_or(msg.chat.id.0, |u| u.id.0.cast_signed())
}

/// True for documents that claim to be images by MIME type or file name
fn is_image_document(mime_type: Option<&str>, file_name: Option<&str>) -> bool {
    if mime_type.is_some_and(|mime| mime.starts_with("image/")) {
        return true;
    }
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Image carried by a message, with its caption.
///
/// Compressed photos use their largest size. Images sent as files keep
/// their original encoding, so the preprocessor sees the real format and
/// rejects the ones it cannot read.
#[must_use]
pub fn image_event(msg: &Message) -> Option<Event> {
    let file_id = if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        photo.file.id.0.clone()
    } else {
        let doc = msg.document()?;
        let mime = doc.mime_type.as_ref().map(ToString::to_string);
        if !is_image_document(mime.as_deref(), doc.file_name.as_deref()) {
            return None;
        }
        doc.file.id.0.clone()
    };

    Some(Event::Photo {
        file_id,
        caption: msg.caption().map(ToString::to_string),
    })
}

/// Commands and free text.
///
/// # Errors
///
/// Never fails; the signature matches teloxide endpoints.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    gateway: Arc<Gateway>,
    settings: Arc<Settings>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let Some(event) = Event::from_text(text, &settings.bot_username) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring command for another bot");
        return respond(());
    };

    let transport = TelegramTransport::new(bot, msg.chat.id);
    gateway
        .handle(&transport, sender_key(&msg), event)
        .await;
    respond(())
}

/// Photos and image files.
///
/// # Errors
///
/// Never fails; the signature matches teloxide endpoints.
pub async fn handle_image(bot: Bot, msg: Message, gateway: Arc<Gateway>) -> ResponseResult<()> {
    let Some(event) = image_event(&msg) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring non-image document");
        return respond(());
    };

    let transport = TelegramTransport::new(bot, msg.chat.id);
    gateway
        .handle(&transport, sender_key(&msg), event)
        .await;
    respond(())
}

/// Inline keyboard presses.
///
/// # Errors
///
/// Never fails; the signature matches teloxide endpoints.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    gateway: Arc<Gateway>,
) -> ResponseResult<()> {
    // Stop the button's loading spinner first
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let (Some(data), Some(chat_id)) = (q.data.clone(), q.message.as_ref().map(|m| m.chat().id))
    else {
        return respond(());
    };

    let transport = TelegramTransport::new(bot, chat_id);
    gateway
        .handle(&transport, q.from.id.0.cast_signed(), Event::Callback(data))
        .await;
    respond(())
}

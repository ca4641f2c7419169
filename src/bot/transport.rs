//! Bot API implementation of the gateway's outbound side

use super::resilient::send_html_resilient;
use super::views::quick_actions_keyboard;
use crate::gateway::ChatTransport;
use crate::router::QuickAction;
use crate::utils::retry_telegram_operation;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, FileId};

/// Replies into one Telegram chat
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramTransport {
    /// Transport bound to `chat_id`
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_typing(&self) -> anyhow::Result<()> {
        self.bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await?;
        Ok(())
    }

    async fn send_html(
        &self,
        html: &str,
        actions: Option<&'static [QuickAction]>,
    ) -> anyhow::Result<()> {
        let keyboard = actions.map(quick_actions_keyboard);
        send_html_resilient(&self.bot, self.chat_id, html, keyboard.as_ref()).await?;
        Ok(())
    }

    async fn download_photo(&self, file_id: &str) -> anyhow::Result<Vec<u8>> {
        let file_id = FileId(file_id.to_string());
        retry_telegram_operation(|| async {
            let file = self.bot.get_file(file_id.clone()).await?;
            let mut buf = Vec::new();
            self.bot.download_file(&file.path, &mut buf).await?;
            Ok(buf)
        })
        .await
    }
}

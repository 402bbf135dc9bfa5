//! Telegram adapter (teloxide).
//!
//! This crate implements the `kbn-core` MessagingPort over Telegram Bot API.
//! Updates arrive through the `/news` webhook and are parsed in core, so no
//! dispatcher lives here.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode, Recipient},
};

use tokio::time::sleep;
use tracing::info;

use kbn_core::{
    domain::{ChatId, ChatTarget, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Bot::new(token))
    }

    /// Point Telegram's webhook at `url` (the `/news` endpoint).
    pub async fn register_webhook(&self, url: &str) -> Result<()> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid webhook url {url}: {e}")))?;
        self.with_retry(|| self.bot.set_webhook(url.clone())).await?;
        info!(%url, "telegram webhook registered");
        Ok(())
    }

    fn recipient(target: &ChatTarget) -> Recipient {
        match target {
            ChatTarget::Id(id) => Recipient::Id(teloxide::types::ChatId(id.0)),
            ChatTarget::Channel(name) => Recipient::ChannelUsername(name.clone()),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    fn sent_ref(msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_photos: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_html(&self, target: &ChatTarget, html: &str) -> Result<MessageRef> {
        let recipient = Self::recipient(target);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(recipient.clone(), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(Self::sent_ref(&msg))
    }

    async fn send_inline_keyboard(
        &self,
        target: &ChatTarget,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let recipient = Self::recipient(target);
        let markup = Self::markup(keyboard);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(recipient.clone(), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::sent_ref(&msg))
    }

    async fn send_photo(
        &self,
        target: &ChatTarget,
        photo_url: &str,
        caption_html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let recipient = Self::recipient(target);
        let photo = url::Url::parse(photo_url)
            .map_err(|e| Error::Validation(format!("invalid image_url {photo_url}: {e}")))?;
        let markup = keyboard.map(Self::markup);
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_photo(recipient.clone(), InputFile::url(photo.clone()))
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html);
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;
        Ok(Self::sent_ref(&msg))
    }

    async fn clear_inline_keyboard(&self, msg: MessageRef) -> Result<()> {
        // Without a reply_markup the keyboard is removed.
        self.with_retry(|| {
            self.bot
                .edit_message_reply_markup(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kbn_core::messaging::types::InlineButton;

    use super::*;

    #[test]
    fn targets_map_to_recipients() {
        assert_eq!(
            TelegramMessenger::recipient(&ChatTarget::Id(ChatId(-100123))),
            Recipient::Id(teloxide::types::ChatId(-100123))
        );
        assert_eq!(
            TelegramMessenger::recipient(&ChatTarget::Channel("@mari_news".into())),
            Recipient::ChannelUsername("@mari_news".into())
        );
    }

    #[test]
    fn keyboard_rows_are_preserved() {
        let kb = InlineKeyboard::new(vec![
            vec![InlineButton::new("✅ Publish", "approve_1"), InlineButton::new("❌ Reject", "reject_1")],
            vec![InlineButton::new("More", "more_1")],
        ]);
        let markup = TelegramMessenger::markup(kb);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[0][1].text, "❌ Reject");
    }

    #[tokio::test]
    async fn bad_photo_url_is_rejected_before_sending() {
        let m = TelegramMessenger::from_token("123:TEST");
        let err = m
            .send_photo(&ChatTarget::Id(ChatId(1)), "not a url", "c", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}

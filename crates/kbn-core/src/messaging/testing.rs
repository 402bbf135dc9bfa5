//! In-memory messenger used by the bot, poller and moderation tests.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, ChatTarget, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Html {
        target: ChatTarget,
        html: String,
    },
    Keyboard {
        target: ChatTarget,
        html: String,
        keyboard: InlineKeyboard,
    },
    Photo {
        target: ChatTarget,
        photo_url: String,
        caption: String,
        keyboard: Option<InlineKeyboard>,
    },
    ClearKeyboard(MessageRef),
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    fail_sends: AtomicBool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        let m = Self::default();
        m.fail_sends.store(true, Ordering::SeqCst);
        m
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    /// Everything except callback answers and keyboard removals.
    pub async fn posts(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    Sent::Html { .. } | Sent::Keyboard { .. } | Sent::Photo { .. }
                )
            })
            .cloned()
            .collect()
    }

    async fn record(&self, target: &ChatTarget, entry: Sent) -> Result<MessageRef> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::External("telegram error: chat not found".to_string()));
        }
        self.sent.lock().await.push(entry);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef {
            chat_id: target.chat_id().unwrap_or(ChatId(-100)),
            message_id: MessageId(id),
        })
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_photos: true,
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_html(&self, target: &ChatTarget, html: &str) -> Result<MessageRef> {
        let entry = Sent::Html {
            target: target.clone(),
            html: html.to_string(),
        };
        self.record(target, entry).await
    }

    async fn send_inline_keyboard(
        &self,
        target: &ChatTarget,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let entry = Sent::Keyboard {
            target: target.clone(),
            html: html.to_string(),
            keyboard,
        };
        self.record(target, entry).await
    }

    async fn send_photo(
        &self,
        target: &ChatTarget,
        photo_url: &str,
        caption_html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let entry = Sent::Photo {
            target: target.clone(),
            photo_url: photo_url.to_string(),
            caption: caption_html.to_string(),
            keyboard,
        };
        self.record(target, entry).await
    }

    async fn clear_inline_keyboard(&self, msg: MessageRef) -> Result<()> {
        self.sent.lock().await.push(Sent::ClearKeyboard(msg));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.sent.lock().await.push(Sent::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

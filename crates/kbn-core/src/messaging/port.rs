use async_trait::async_trait;

use crate::{
    domain::{ChatTarget, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; the news bot, the poller and the
/// moderation flow talk to it exclusively through this trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, target: &ChatTarget, html: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        target: &ChatTarget,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Send a photo by URL with an HTML caption and an optional keyboard.
    async fn send_photo(
        &self,
        target: &ChatTarget,
        photo_url: &str,
        caption_html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    /// Remove the inline keyboard from a previously sent message.
    async fn clear_inline_keyboard(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

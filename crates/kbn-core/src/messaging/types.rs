use crate::domain::{ChatId, MessageRef, UserId};

/// Cross-messenger incoming update model.
///
/// Only the update kinds the news bot reacts to are modelled; anything else is
/// dropped by the webhook parser.
#[derive(Clone, Debug, PartialEq)]
pub enum IncomingUpdate {
    Text(TextMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub user_id: UserId,
    pub username: Option<String>,
    pub data: String,
    pub message: Option<MessageRef>,
}

/// Inline keyboard (buttons) attached to moderator notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// All buttons side by side.
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_photos: bool,
    pub max_message_len: usize,
    pub max_caption_len: usize,
}

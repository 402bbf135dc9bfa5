//! Telegram webhook payloads → [`IncomingUpdate`].
//!
//! Only the fields the bot uses are declared; everything else in the update is
//! ignored, so partial or future payload shapes still parse.

use serde::Deserialize;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery, IncomingUpdate, TextMessage},
};

#[derive(Debug, Deserialize)]
struct RawUpdate {
    message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: Option<i32>,
    chat: Option<RawChat>,
    from: Option<RawUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: RawUser,
    data: Option<String>,
    message: Option<RawMessage>,
}

/// Parse a webhook body. Returns `None` for updates the bot does not handle
/// (edited messages, stickers, messages without text or chat).
pub fn parse_update(body: &serde_json::Value) -> Option<IncomingUpdate> {
    let raw: RawUpdate = serde_json::from_value(body.clone()).ok()?;

    if let Some(cb) = raw.callback_query {
        let message = cb.message.and_then(|m| {
            Some(MessageRef {
                chat_id: ChatId(m.chat?.id),
                message_id: MessageId(m.message_id?),
            })
        });
        return Some(IncomingUpdate::Callback(CallbackQuery {
            callback_id: cb.id,
            user_id: UserId(cb.from.id),
            username: cb.from.username,
            data: cb.data.unwrap_or_default(),
            message,
        }));
    }

    let msg = raw.message?;
    let text = msg.text.filter(|t| !t.trim().is_empty())?;
    let chat = msg.chat?;
    Some(IncomingUpdate::Text(TextMessage {
        chat_id: ChatId(chat.id),
        user_id: msg.from.as_ref().map(|u| UserId(u.id)),
        username: msg.from.and_then(|u| u.username),
        text,
    }))
}

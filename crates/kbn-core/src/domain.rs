use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Where an outgoing message goes: a numeric chat or a public `@channel`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(ChatId),
    Channel(String),
}

impl ChatTarget {
    /// Parse `-100123`, `42` or `@channel`. Empty input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(id) = raw.parse::<i64>() {
            return Some(ChatTarget::Id(ChatId(id)));
        }
        if raw.starts_with('@') {
            return Some(ChatTarget::Channel(raw.to_string()));
        }
        Some(ChatTarget::Channel(format!("@{raw}")))
    }

    /// Accept the loose JSON shapes clients send (`123`, `"123"`, `"@chan"`).
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        if let Some(n) = v.as_i64() {
            return Some(ChatTarget::Id(ChatId(n)));
        }
        v.as_str().and_then(Self::parse)
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            ChatTarget::Id(id) => Some(*id),
            ChatTarget::Channel(_) => None,
        }
    }
}

impl From<ChatId> for ChatTarget {
    fn from(id: ChatId) -> Self {
        ChatTarget::Id(id)
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{}", id.0),
            ChatTarget::Channel(name) => f.write_str(name),
        }
    }
}

use crate::messaging::types::{InlineButton, InlineKeyboard};

/// Operator decision carried in callback data (`approve_<id>` / `reject_<id>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModerationAction {
    Approve(i64),
    Reject(i64),
}

impl ModerationAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (verb, id) = data.trim().split_once('_')?;
        let id = id.parse::<i64>().ok().filter(|id| *id > 0)?;
        match verb {
            "approve" => Some(ModerationAction::Approve(id)),
            "reject" => Some(ModerationAction::Reject(id)),
            _ => None,
        }
    }

    pub fn item_id(self) -> i64 {
        match self {
            ModerationAction::Approve(id) | ModerationAction::Reject(id) => id,
        }
    }

    pub fn callback_data(self) -> String {
        match self {
            ModerationAction::Approve(id) => format!("approve_{id}"),
            ModerationAction::Reject(id) => format!("reject_{id}"),
        }
    }
}

/// Approve / reject buttons attached to a moderator notification.
pub fn moderation_keyboard(item_id: i64) -> InlineKeyboard {
    InlineKeyboard::single_row(vec![
        InlineButton::new(
            "✅ Publish",
            ModerationAction::Approve(item_id).callback_data(),
        ),
        InlineButton::new(
            "❌ Reject",
            ModerationAction::Reject(item_id).callback_data(),
        ),
    ])
}

/// What a moderation callback ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationOutcome {
    Published,
    Rejected,
    /// The item already left `pending_moderation`; nothing was done.
    AlreadyProcessed,
    /// The item is still `new` (no moderator notification went out yet).
    NotAwaitingModeration,
    NotFound,
    InvalidAction,
    Unauthorized,
    Disabled,
    /// Publishing failed; the item went back to `pending_moderation`.
    PublishFailed(String),
}

//! Moderation callbacks (`approve_<id>` / `reject_<id>`).
//!
//! Every state change is a compare-and-set on the item status, so a callback
//! delivered twice publishes at most once.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    domain::{ChatTarget, MessageRef},
    formatting::news_caption_html,
    messaging::{port::MessagingPort, types::CallbackQuery},
    news::{
        moderation::{ModerationAction, ModerationOutcome},
        store::NewsStore,
        NewsItem, NewsStatus,
    },
    Result,
};

use super::NewsBot;

struct ModerationPorts<'a> {
    store: &'a Arc<dyn NewsStore>,
    messenger: &'a Arc<dyn MessagingPort>,
    moderator: &'a ChatTarget,
    channel: &'a ChatTarget,
}

impl NewsBot {
    fn moderation_ports(&self) -> Option<ModerationPorts<'_>> {
        Some(ModerationPorts {
            store: self.store.as_ref()?,
            messenger: self.messenger.as_ref()?,
            moderator: self.moderator.as_ref()?,
            channel: self.channel.as_ref()?,
        })
    }

    pub async fn handle_callback(&self, cb: CallbackQuery) -> ModerationOutcome {
        let Some(ports) = self.moderation_ports() else {
            if let Some(m) = &self.messenger {
                answer(m.as_ref(), &cb, "Moderation is not enabled").await;
            }
            return ModerationOutcome::Disabled;
        };

        if !is_from_moderator(&cb, ports.moderator) {
            warn!(user = cb.user_id.0, "moderation callback from outside the moderator chat");
            answer(ports.messenger.as_ref(), &cb, "Not allowed").await;
            return ModerationOutcome::Unauthorized;
        }

        let Some(action) = ModerationAction::parse(&cb.data) else {
            answer(ports.messenger.as_ref(), &cb, "Unknown action").await;
            return ModerationOutcome::InvalidAction;
        };

        let (outcome, reply) = match self.apply(&ports, action, cb.message).await {
            Ok(outcome) => {
                let reply = match &outcome {
                    ModerationOutcome::Published => "✅ Published".to_string(),
                    ModerationOutcome::Rejected => "❌ Rejected".to_string(),
                    ModerationOutcome::AlreadyProcessed => "Already processed".to_string(),
                    ModerationOutcome::NotAwaitingModeration => {
                        "Not awaiting moderation".to_string()
                    }
                    ModerationOutcome::NotFound => "News item not found".to_string(),
                    ModerationOutcome::PublishFailed(e) => format!("Publishing failed: {e}"),
                    _ => String::new(),
                };
                (outcome, reply)
            }
            Err(e) => {
                warn!(item = action.item_id(), "moderation failed: {e}");
                (ModerationOutcome::PublishFailed(e.to_string()), format!("Error: {e}"))
            }
        };

        answer(ports.messenger.as_ref(), &cb, &reply).await;
        outcome
    }

    async fn apply(
        &self,
        ports: &ModerationPorts<'_>,
        action: ModerationAction,
        callback_message: Option<MessageRef>,
    ) -> Result<ModerationOutcome> {
        let id = action.item_id();
        let Some(item) = ports.store.get_item(id).await? else {
            return Ok(ModerationOutcome::NotFound);
        };
        let notification = item.moderator_message.or(callback_message);

        match action {
            ModerationAction::Reject(_) => {
                if !ports
                    .store
                    .transition(id, NewsStatus::PendingModeration, NewsStatus::Rejected)
                    .await?
                {
                    return not_pending(ports.store.as_ref(), id).await;
                }
                info!(item = id, "news item rejected");
                clear_keyboard(ports.messenger.as_ref(), notification).await;
                Ok(ModerationOutcome::Rejected)
            }
            ModerationAction::Approve(_) => {
                // Claim first: a concurrent or repeated approve sees `false`.
                if !ports
                    .store
                    .transition(id, NewsStatus::PendingModeration, NewsStatus::Published)
                    .await?
                {
                    return not_pending(ports.store.as_ref(), id).await;
                }

                if let Err(e) = publish_item(ports.messenger.as_ref(), ports.channel, &item).await {
                    warn!(item = id, "publishing approved item failed: {e}");
                    ports
                        .store
                        .transition(id, NewsStatus::Published, NewsStatus::PendingModeration)
                        .await?;
                    return Ok(ModerationOutcome::PublishFailed(e.to_string()));
                }

                // Already posted; a failed stamp is only logged.
                if let Err(e) = ports.store.mark_published(id, Utc::now()).await {
                    warn!(item = id, "failed to stamp published_at: {e}");
                }
                info!(item = id, channel = %ports.channel, "news item published");
                clear_keyboard(ports.messenger.as_ref(), notification).await;
                Ok(ModerationOutcome::Published)
            }
        }
    }
}

/// Why a compare-and-set from `pending_moderation` did not apply.
async fn not_pending(store: &dyn NewsStore, id: i64) -> Result<ModerationOutcome> {
    Ok(match store.get_item(id).await? {
        None => ModerationOutcome::NotFound,
        Some(item) if item.status == NewsStatus::New => ModerationOutcome::NotAwaitingModeration,
        Some(_) => ModerationOutcome::AlreadyProcessed,
    })
}

/// Callbacks count when they come from the moderator chat (or, for a private
/// moderator chat, from that user). Channel-name targets cannot be compared.
fn is_from_moderator(cb: &CallbackQuery, moderator: &ChatTarget) -> bool {
    match moderator.chat_id() {
        Some(chat) => {
            cb.message.map(|m| m.chat_id) == Some(chat) || cb.user_id.0 == chat.0
        }
        None => true,
    }
}

async fn publish_item(
    messenger: &dyn MessagingPort,
    channel: &ChatTarget,
    item: &NewsItem,
) -> Result<MessageRef> {
    let caps = messenger.capabilities();
    match item.image_url.as_deref() {
        Some(photo) if caps.supports_photos => {
            let caption = news_caption_html(
                item.display_title(),
                item.display_text(),
                Some(&item.url),
                caps.max_caption_len,
            );
            messenger.send_photo(channel, photo, &caption, None).await
        }
        _ => {
            let html = news_caption_html(
                item.display_title(),
                item.display_text(),
                Some(&item.url),
                caps.max_message_len,
            );
            messenger.send_html(channel, &html).await
        }
    }
}

async fn clear_keyboard(messenger: &dyn MessagingPort, msg: Option<MessageRef>) {
    if let Some(msg) = msg {
        if let Err(e) = messenger.clear_inline_keyboard(msg).await {
            warn!("failed to clear moderation keyboard: {e}");
        }
    }
}

async fn answer(messenger: &dyn MessagingPort, cb: &CallbackQuery, text: &str) {
    let text = Some(text).filter(|t| !t.is_empty());
    if let Err(e) = messenger.answer_callback_query(&cb.callback_id, text).await {
        warn!("failed to answer callback query: {e}");
    }
}

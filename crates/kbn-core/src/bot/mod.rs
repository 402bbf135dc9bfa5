//! News bot service: parse + translate articles, publish posts, react to
//! Telegram updates and drive the moderation workflow.
//!
//! Without a store the bot runs stateless (`parse`, `publish`, `webhook`
//! links). With a store, a messenger and a moderator chat it also polls
//! sources and handles moderation callbacks.

pub mod handler;
pub mod moderation;

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    domain::{ChatTarget, MessageRef},
    errors::Error,
    extract::extract_article,
    fetch::PageFetcher,
    formatting::{news_caption_html, truncate_chars, truncate_with_ellipsis},
    http::str_field,
    messaging::{port::MessagingPort, types::IncomingUpdate},
    news::{moderation::ModerationOutcome, store::NewsStore, NewSource, NewsSource},
    poller::{PollSummary, SourcePoller, MAX_TRANSLATE_CHARS},
    translate::{translate_or_inline, Translator},
    utils::iso_timestamp_local,
    Result,
};

/// Characters of the original text echoed back by `parse`.
const ORIGINAL_PREVIEW_CHARS: usize = 500;

const PROCESSING_NOTICE: &str = "🔄 Processing the news...";
const FAILURE_NOTICE: &str = "❌ Could not process the link";
const HELP_TEXT: &str = "👋 Send me a link to a news article.\n\n\
    I will fetch it, translate it and post the translation here.";

/// Result of the `parse` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedNews {
    pub url: String,
    pub title: String,
    pub text: String,
    pub translated_title: String,
    pub translated_text: String,
    pub timestamp: String,
}

impl ParsedNews {
    pub fn to_json(&self) -> Value {
        json!({
            "success": true,
            "original": {
                "title": self.title,
                "text": truncate_with_ellipsis(&self.text, ORIGINAL_PREVIEW_CHARS),
                "url": self.url,
            },
            "translated": {
                "title": self.translated_title,
                "text": self.translated_text,
            },
            "timestamp": self.timestamp,
        })
    }
}

/// Input of the `publish` action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishRequest {
    pub target: ChatTarget,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl PublishRequest {
    /// `channel_id` wins over `chat_id`; one of them is required.
    pub fn from_json(body: &Value) -> Result<Self> {
        let target = ["channel_id", "chat_id"]
            .iter()
            .filter_map(|k| body.get(*k))
            .find_map(ChatTarget::from_json)
            .ok_or_else(|| Error::Validation("channel_id or chat_id is required".to_string()))?;

        Ok(Self {
            target,
            title: str_field(body, "title").unwrap_or_default(),
            text: str_field(body, "text").unwrap_or_default(),
            url: str_field(body, "url"),
            image_url: str_field(body, "image_url"),
        })
    }
}

/// What the bot did with a webhook update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Ignored,
    Help,
    /// A link was processed; `published` is false when the failure notice was sent.
    LinkProcessed { published: bool },
    Moderation(ModerationOutcome),
}

pub struct NewsBot {
    fetcher: Arc<dyn PageFetcher>,
    translator: Option<Arc<dyn Translator>>,
    messenger: Option<Arc<dyn MessagingPort>>,
    store: Option<Arc<dyn NewsStore>>,
    moderator: Option<ChatTarget>,
    channel: Option<ChatTarget>,
}

impl NewsBot {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            translator: None,
            messenger: None,
            store: None,
            moderator: None,
            channel: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn MessagingPort>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn NewsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Moderator chat receives new items; approved items go to `channel`.
    pub fn with_moderation(mut self, moderator: ChatTarget, channel: ChatTarget) -> Self {
        self.moderator = Some(moderator);
        self.channel = Some(channel);
        self
    }

    pub fn is_store_backed(&self) -> bool {
        self.store.is_some()
    }

    fn messenger(&self) -> Result<&Arc<dyn MessagingPort>> {
        self.messenger
            .as_ref()
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is not configured".to_string()))
    }

    fn store(&self) -> Result<&Arc<dyn NewsStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Config("DATABASE_PATH is not configured".to_string()))
    }

    /// Fetch `url`, extract the article and translate title and body.
    ///
    /// Translation failures are inlined in the result, never returned.
    pub async fn parse(&self, url: &str) -> Result<ParsedNews> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not configured".to_string()))?;

        let html = self.fetcher.fetch(url).await?;
        let article = extract_article(&html)?;

        let translated_title = translate_or_inline(translator.as_ref(), &article.title).await;
        let body = truncate_chars(&article.text, MAX_TRANSLATE_CHARS);
        let translated_text = translate_or_inline(translator.as_ref(), &body).await;

        info!(%url, chars = article.text.chars().count(), "article parsed");
        Ok(ParsedNews {
            url: url.to_string(),
            title: article.title,
            text: article.text,
            translated_title,
            translated_text,
            timestamp: iso_timestamp_local(),
        })
    }

    /// Post a formatted news message (or a captioned photo) to a chat.
    pub async fn publish(&self, req: &PublishRequest) -> Result<MessageRef> {
        let messenger = self.messenger()?;
        let caps = messenger.capabilities();

        let msg = match req.image_url.as_deref() {
            Some(photo) if caps.supports_photos => {
                let caption = news_caption_html(
                    &req.title,
                    &req.text,
                    req.url.as_deref(),
                    caps.max_caption_len,
                );
                messenger.send_photo(&req.target, photo, &caption, None).await?
            }
            _ => {
                let html = news_caption_html(
                    &req.title,
                    &req.text,
                    req.url.as_deref(),
                    caps.max_message_len,
                );
                messenger.send_html(&req.target, &html).await?
            }
        };

        info!(chat = %req.target, message_id = msg.message_id.0, "news published");
        Ok(msg)
    }

    pub async fn handle_update(&self, update: IncomingUpdate) -> UpdateOutcome {
        match update {
            IncomingUpdate::Callback(cb) => UpdateOutcome::Moderation(self.handle_callback(cb).await),
            IncomingUpdate::Text(msg) => {
                let text = msg.text.trim();
                let Ok(messenger) = self.messenger() else {
                    warn!("webhook message ignored: no messenger configured");
                    return UpdateOutcome::Ignored;
                };
                let chat = ChatTarget::Id(msg.chat_id);

                if text == "/start" || text.starts_with("/start ") || text == "/help" {
                    if let Err(e) = messenger.send_html(&chat, HELP_TEXT).await {
                        warn!("failed to send help: {e}");
                    }
                    return UpdateOutcome::Help;
                }
                if !text.starts_with("http") {
                    return UpdateOutcome::Ignored;
                }

                let published = self.process_link(messenger.as_ref(), &chat, text).await;
                UpdateOutcome::LinkProcessed { published }
            }
        }
    }

    /// Parse + translate a link sent to the bot and post the result back.
    async fn process_link(&self, messenger: &dyn MessagingPort, chat: &ChatTarget, url: &str) -> bool {
        if let Err(e) = messenger.send_html(chat, PROCESSING_NOTICE).await {
            warn!("failed to send processing notice: {e}");
        }

        let result = match self.parse(url).await {
            Ok(parsed) => {
                self.publish(&PublishRequest {
                    target: chat.clone(),
                    title: parsed.translated_title,
                    text: parsed.translated_text,
                    url: Some(url.to_string()),
                    image_url: None,
                })
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(%url, "link processing failed: {e}");
                if let Err(e) = messenger.send_html(chat, FAILURE_NOTICE).await {
                    warn!("failed to send failure notice: {e}");
                }
                false
            }
        }
    }

    pub async fn add_source(&self, source: NewSource) -> Result<NewsSource> {
        let created = self.store()?.add_source(source).await?;
        info!(id = created.id, name = %created.name, "news source added");
        Ok(created)
    }

    pub async fn check_sources(&self) -> Result<PollSummary> {
        self.poller()?.check_sources(Utc::now()).await
    }

    /// A poller sharing this bot's ports. Needs a store, a messenger and a
    /// moderator chat.
    pub fn poller(&self) -> Result<SourcePoller> {
        let store = self.store()?;
        let messenger = self.messenger()?;
        let moderator = self
            .moderator
            .clone()
            .ok_or_else(|| Error::Config("MODERATOR_CHAT_ID is not configured".to_string()))?;

        Ok(SourcePoller::new(
            Arc::clone(store),
            Arc::clone(&self.fetcher),
            self.translator.clone(),
            Arc::clone(messenger),
            moderator,
        ))
    }
}

//! Source poller: finds new articles on configured news sources, stores them,
//! translates them and asks the moderator for a decision.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    domain::ChatTarget,
    extract::{
        extract_candidates, SourceSelectors, DEFAULT_IMAGE_SELECTOR, DEFAULT_TEXT_SELECTOR,
        DEFAULT_TITLE_SELECTOR,
    },
    fetch::PageFetcher,
    formatting::{news_caption_html, truncate_chars},
    messaging::port::MessagingPort,
    news::{
        moderation::moderation_keyboard, store::NewsStore, NewItem, NewsItem, NewsSource,
        NewsStatus,
    },
    translate::{translate_or_inline, Translator},
    Result,
};

/// Articles taken from one listing page per check.
pub const MAX_CANDIDATES: usize = 5;

/// Longest text sent for translation.
pub const MAX_TRANSLATE_CHARS: usize = 3000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    /// Sources fetched in this run.
    pub checked: usize,
    /// Active sources that were not due yet.
    pub skipped: usize,
    pub new_items: usize,
    /// New items that reached the moderator.
    pub notified: usize,
    pub errors: Vec<String>,
}

pub struct SourcePoller {
    store: Arc<dyn NewsStore>,
    fetcher: Arc<dyn PageFetcher>,
    translator: Option<Arc<dyn Translator>>,
    messenger: Arc<dyn MessagingPort>,
    moderator: ChatTarget,
}

impl SourcePoller {
    pub fn new(
        store: Arc<dyn NewsStore>,
        fetcher: Arc<dyn PageFetcher>,
        translator: Option<Arc<dyn Translator>>,
        messenger: Arc<dyn MessagingPort>,
        moderator: ChatTarget,
    ) -> Self {
        Self {
            store,
            fetcher,
            translator,
            messenger,
            moderator,
        }
    }

    /// Check every due source once.
    ///
    /// One failing source never stops the run; its error lands in the summary.
    /// `last_checked_at` is stamped for every source that was attempted.
    pub async fn check_sources(&self, now: DateTime<Utc>) -> Result<PollSummary> {
        let mut summary = PollSummary::default();

        for source in self.store.list_sources(true).await? {
            if !source.is_due(now) {
                summary.skipped += 1;
                continue;
            }
            summary.checked += 1;

            if let Err(e) = self.check_source(&source, &mut summary).await {
                warn!(source = %source.name, "source check failed: {e}");
                summary.errors.push(format!("{}: {e}", source.name));
            }
            if let Err(e) = self.store.touch_source(source.id, now).await {
                warn!(source = %source.name, "failed to stamp last_checked_at: {e}");
            }
        }

        info!(
            checked = summary.checked,
            new_items = summary.new_items,
            notified = summary.notified,
            errors = summary.errors.len(),
            "source check finished"
        );
        Ok(summary)
    }

    async fn check_source(&self, source: &NewsSource, summary: &mut PollSummary) -> Result<()> {
        let html = self.fetcher.fetch(&source.url).await?;
        let selectors = SourceSelectors {
            title: source
                .title_selector
                .as_deref()
                .unwrap_or(DEFAULT_TITLE_SELECTOR),
            text: source.text_selector.as_deref().unwrap_or(DEFAULT_TEXT_SELECTOR),
            image: source
                .image_selector
                .as_deref()
                .unwrap_or(DEFAULT_IMAGE_SELECTOR),
        };
        let candidates = extract_candidates(&html, &source.url, selectors, MAX_CANDIDATES)?;

        for c in candidates {
            if self.store.item_exists(&c.url).await? {
                continue;
            }
            let url = c.url.clone();
            let Some(item) = self
                .store
                .insert_item(NewItem {
                    source_id: Some(source.id),
                    url: c.url,
                    title: c.title,
                    text: c.text,
                    image_url: c.image_url,
                })
                .await?
            else {
                continue;
            };
            summary.new_items += 1;

            match self.submit_for_moderation(item).await {
                Ok(()) => summary.notified += 1,
                Err(e) => {
                    warn!(%url, "failed to notify moderator: {e}");
                    summary.errors.push(format!("{url}: {e}"));
                }
            }
        }
        Ok(())
    }

    /// Translate, notify the moderator, then move the item to
    /// `pending_moderation`. Any failure leaves it in `new`.
    async fn submit_for_moderation(&self, mut item: NewsItem) -> Result<()> {
        if let Some(translator) = &self.translator {
            let title = translate_or_inline(translator.as_ref(), &item.original_title).await;
            let body = truncate_chars(&item.original_text, MAX_TRANSLATE_CHARS);
            let text = translate_or_inline(translator.as_ref(), &body).await;
            self.store.save_translation(item.id, &title, &text).await?;
            item.translated_title = Some(title);
            item.translated_text = Some(text);
        }

        let caps = self.messenger.capabilities();
        let keyboard = moderation_keyboard(item.id);
        let message = match item.image_url.as_deref() {
            Some(photo) if caps.supports_photos => {
                let caption = news_caption_html(
                    item.display_title(),
                    item.display_text(),
                    Some(&item.url),
                    caps.max_caption_len,
                );
                self.messenger
                    .send_photo(&self.moderator, photo, &caption, Some(keyboard))
                    .await?
            }
            _ => {
                let html = news_caption_html(
                    item.display_title(),
                    item.display_text(),
                    Some(&item.url),
                    caps.max_message_len,
                );
                self.messenger
                    .send_inline_keyboard(&self.moderator, &html, keyboard)
                    .await?
            }
        };

        self.store.set_moderator_message(item.id, message).await?;
        self.store
            .transition(item.id, NewsStatus::New, NewsStatus::PendingModeration)
            .await?;
        Ok(())
    }
}

/// Run [`SourcePoller::check_sources`] every `every` until cancelled. The
/// first check happens immediately.
pub async fn run_poll_loop(poller: Arc<SourcePoller>, every: Duration, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                if let Err(e) = poller.check_sources(Utc::now()).await {
                    error!("poll loop: {e}");
                }
            }
        }
    }
    info!("poll loop stopped");
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        domain::ChatId,
        fetch::testing::StaticFetcher,
        messaging::testing::{RecordingMessenger, Sent},
        news::{memory::MemoryNewsStore, NewSource},
        translate::testing::FakeTranslator,
    };

    const LISTING: &str = r#"
        <div class="news-item"><h2><a href="/n/1">Первая</a></h2><p>Текст один.</p></div>
        <div class="news-item"><h2><a href="/n/2">Вторая</a></h2><img src="/i/2.jpg"><p>Текст два.</p></div>"#;

    fn moderator() -> ChatTarget {
        ChatTarget::Id(ChatId(777))
    }

    async fn store_with(sources: &[(&str, &str)]) -> Arc<MemoryNewsStore> {
        let store = Arc::new(MemoryNewsStore::new());
        for (name, url) in sources {
            store
                .add_source(NewSource {
                    name: name.to_string(),
                    url: url.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        store
    }

    fn poller(
        store: Arc<MemoryNewsStore>,
        fetcher: StaticFetcher,
        messenger: Arc<RecordingMessenger>,
    ) -> SourcePoller {
        SourcePoller::new(
            store,
            Arc::new(fetcher),
            Some(Arc::new(FakeTranslator::default())),
            messenger,
            moderator(),
        )
    }

    #[tokio::test]
    async fn new_articles_go_to_moderation() {
        let store = store_with(&[("Mari El", "https://news.example.com/")]).await;
        let messenger = Arc::new(RecordingMessenger::default());
        let fetcher = StaticFetcher::default().with_page("https://news.example.com/", LISTING);
        let p = poller(store.clone(), fetcher, messenger.clone());

        let summary = p.check_sources(Utc::now()).await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.new_items, 2);
        assert_eq!(summary.notified, 2);
        assert!(summary.errors.is_empty());

        let items = store.items().await;
        assert!(items
            .iter()
            .all(|i| i.status == NewsStatus::PendingModeration && i.moderator_message.is_some()));
        assert_eq!(items[0].translated_title.as_deref(), Some("[mhr] Первая"));
        assert_eq!(items[0].source_id, Some(1));

        let posts = messenger.posts().await;
        assert!(matches!(
            &posts[0],
            Sent::Keyboard { target, html, keyboard }
                if *target == moderator()
                    && html.contains("https://news.example.com/n/1")
                    && keyboard.rows[0][0].callback_data == "approve_1"
        ));
        assert!(matches!(
            &posts[1],
            Sent::Photo { photo_url, keyboard: Some(_), .. }
                if photo_url == "https://news.example.com/i/2.jpg"
        ));
    }

    #[tokio::test]
    async fn rechecking_never_duplicates_urls() {
        let store = store_with(&[("Mari El", "https://news.example.com/")]).await;
        let messenger = Arc::new(RecordingMessenger::default());
        let fetcher = StaticFetcher::default().with_page("https://news.example.com/", LISTING);
        let p = poller(store.clone(), fetcher, messenger.clone());

        let now = Utc::now();
        p.check_sources(now).await.unwrap();
        let again = p
            .check_sources(now + ChronoDuration::minutes(61))
            .await
            .unwrap();
        assert_eq!(again.checked, 1);
        assert_eq!(again.new_items, 0);
        assert_eq!(store.items().await.len(), 2);
        assert_eq!(messenger.posts().await.len(), 2);
    }

    #[tokio::test]
    async fn failing_source_does_not_stop_the_run() {
        let store = store_with(&[
            ("Broken", "https://down.example.com/"),
            ("Mari El", "https://news.example.com/"),
        ])
        .await;
        let messenger = Arc::new(RecordingMessenger::default());
        let fetcher = StaticFetcher::default().with_page("https://news.example.com/", LISTING);
        let p = poller(store.clone(), fetcher, messenger);

        let now = Utc::now();
        let summary = p.check_sources(now).await.unwrap();
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.new_items, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("Broken: "));

        let sources = store.list_sources(false).await.unwrap();
        assert!(sources.iter().all(|s| s.last_checked_at == Some(now)));
    }

    #[tokio::test]
    async fn sources_not_due_are_skipped() {
        let store = store_with(&[("Mari El", "https://news.example.com/")]).await;
        let now = Utc::now();
        store
            .touch_source(1, now - ChronoDuration::minutes(5))
            .await
            .unwrap();
        let p = poller(store, StaticFetcher::default(), Arc::new(RecordingMessenger::default()));

        let summary = p.check_sources(now).await.unwrap();
        assert_eq!(summary.checked, 0);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn notification_failure_leaves_item_new() {
        let store = store_with(&[("Mari El", "https://news.example.com/")]).await;
        let messenger = Arc::new(RecordingMessenger::failing());
        let fetcher = StaticFetcher::default().with_page("https://news.example.com/", LISTING);
        let p = poller(store.clone(), fetcher, messenger);

        let summary = p.check_sources(Utc::now()).await.unwrap();
        assert_eq!(summary.new_items, 2);
        assert_eq!(summary.notified, 0);
        assert_eq!(summary.errors.len(), 2);

        let items = store.items().await;
        assert!(items.iter().all(|i| i.status == NewsStatus::New));
        assert!(items.iter().all(|i| i.translated_title.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_runs_until_cancelled() {
        let store = store_with(&[("Mari El", "https://news.example.com/")]).await;
        let fetcher = StaticFetcher::default().with_page("https://news.example.com/", LISTING);
        let p = Arc::new(poller(
            store.clone(),
            fetcher,
            Arc::new(RecordingMessenger::default()),
        ));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(p, Duration::from_secs(60), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.items().await.len(), 2);
    }
}

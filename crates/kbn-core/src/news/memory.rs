//! In-process [`NewsStore`] for the bot and poller tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    domain::MessageRef,
    errors::Error,
    news::{store::NewsStore, NewItem, NewSource, NewsItem, NewsSource, NewsStatus},
    Result,
};

#[derive(Default)]
struct Tables {
    sources: Vec<NewsSource>,
    items: Vec<NewsItem>,
}

#[derive(Default)]
pub struct MemoryNewsStore {
    tables: Mutex<Tables>,
    fail_stamps: AtomicBool,
}

impl MemoryNewsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mark_published` fail while the status column keeps working.
    pub fn set_failing_stamps(&self, fail: bool) {
        self.fail_stamps.store(fail, Ordering::SeqCst);
    }

    pub async fn items(&self) -> Vec<NewsItem> {
        self.tables.lock().await.items.clone()
    }
}

fn item_mut(tables: &mut Tables, id: i64) -> Result<&mut NewsItem> {
    tables
        .items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| Error::NotFound(format!("news item {id}")))
}

#[async_trait]
impl NewsStore for MemoryNewsStore {
    async fn add_source(&self, source: NewSource) -> Result<NewsSource> {
        source.validate()?;
        let mut t = self.tables.lock().await;
        let created = NewsSource {
            id: t.sources.len() as i64 + 1,
            name: source.name.trim().to_string(),
            url: source.url.trim().to_string(),
            check_interval_minutes: source.interval_minutes(),
            is_active: source.is_active.unwrap_or(true),
            title_selector: source.title_selector,
            text_selector: source.text_selector,
            image_selector: source.image_selector,
            last_checked_at: None,
            created_at: Utc::now(),
        };
        t.sources.push(created.clone());
        Ok(created)
    }

    async fn list_sources(&self, active_only: bool) -> Result<Vec<NewsSource>> {
        let t = self.tables.lock().await;
        Ok(t.sources
            .iter()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect())
    }

    async fn touch_source(&self, source_id: i64, checked_at: DateTime<Utc>) -> Result<()> {
        let mut t = self.tables.lock().await;
        let source = t
            .sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| Error::NotFound(format!("news source {source_id}")))?;
        source.last_checked_at = Some(checked_at);
        Ok(())
    }

    async fn item_exists(&self, url: &str) -> Result<bool> {
        Ok(self.tables.lock().await.items.iter().any(|i| i.url == url))
    }

    async fn insert_item(&self, item: NewItem) -> Result<Option<NewsItem>> {
        let mut t = self.tables.lock().await;
        if t.items.iter().any(|i| i.url == item.url) {
            return Ok(None);
        }
        let stored = NewsItem {
            id: t.items.len() as i64 + 1,
            source_id: item.source_id,
            url: item.url,
            original_title: item.title,
            original_text: item.text,
            translated_title: None,
            translated_text: None,
            image_url: item.image_url,
            status: NewsStatus::New,
            moderator_message: None,
            published_at: None,
            created_at: Utc::now(),
        };
        t.items.push(stored.clone());
        Ok(Some(stored))
    }

    async fn get_item(&self, id: i64) -> Result<Option<NewsItem>> {
        let t = self.tables.lock().await;
        Ok(t.items.iter().find(|i| i.id == id).cloned())
    }

    async fn save_translation(&self, id: i64, title: &str, text: &str) -> Result<()> {
        let mut t = self.tables.lock().await;
        let item = item_mut(&mut t, id)?;
        item.translated_title = Some(title.to_string());
        item.translated_text = Some(text.to_string());
        Ok(())
    }

    async fn set_moderator_message(&self, id: i64, message: MessageRef) -> Result<()> {
        let mut t = self.tables.lock().await;
        item_mut(&mut t, id)?.moderator_message = Some(message);
        Ok(())
    }

    async fn transition(&self, id: i64, from: NewsStatus, to: NewsStatus) -> Result<bool> {
        let mut t = self.tables.lock().await;
        match t.items.iter_mut().find(|i| i.id == id) {
            Some(item) if item.status == from => {
                item.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_published(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        if self.fail_stamps.load(Ordering::SeqCst) {
            return Err(Error::External("published_at write failed".to_string()));
        }
        let mut t = self.tables.lock().await;
        item_mut(&mut t, id)?.published_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str) -> NewItem {
        NewItem {
            source_id: None,
            url: url.to_string(),
            title: "t".into(),
            text: "x".into(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn duplicate_urls_are_not_inserted() {
        let store = MemoryNewsStore::new();
        assert!(store.insert_item(candidate("https://e.com/1")).await.unwrap().is_some());
        assert!(store.insert_item(candidate("https://e.com/1")).await.unwrap().is_none());
        assert_eq!(store.items().await.len(), 1);
    }

    #[tokio::test]
    async fn transition_requires_matching_status() {
        let store = MemoryNewsStore::new();
        let item = store.insert_item(candidate("https://e.com/1")).await.unwrap().unwrap();
        assert!(!store
            .transition(item.id, NewsStatus::PendingModeration, NewsStatus::Published)
            .await
            .unwrap());
        assert!(store
            .transition(item.id, NewsStatus::New, NewsStatus::PendingModeration)
            .await
            .unwrap());
        assert!(!store
            .transition(999, NewsStatus::New, NewsStatus::PendingModeration)
            .await
            .unwrap());
    }
}

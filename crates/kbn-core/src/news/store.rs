use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::MessageRef,
    news::{NewItem, NewSource, NewsItem, NewsSource, NewsStatus},
    Result,
};

/// Persistence port for sources and items.
///
/// Implementations must enforce two invariants themselves rather than relying
/// on callers: item URLs are unique, and [`NewsStore::transition`] only
/// applies when the stored status equals `from`.
#[async_trait]
pub trait NewsStore: Send + Sync {
    async fn add_source(&self, source: NewSource) -> Result<NewsSource>;

    async fn list_sources(&self, active_only: bool) -> Result<Vec<NewsSource>>;

    async fn touch_source(&self, source_id: i64, checked_at: DateTime<Utc>) -> Result<()>;

    async fn item_exists(&self, url: &str) -> Result<bool>;

    /// Insert a `new` item. Returns `None` when the URL is already stored.
    async fn insert_item(&self, item: NewItem) -> Result<Option<NewsItem>>;

    async fn get_item(&self, id: i64) -> Result<Option<NewsItem>>;

    async fn save_translation(&self, id: i64, title: &str, text: &str) -> Result<()>;

    async fn set_moderator_message(&self, id: i64, message: MessageRef) -> Result<()>;

    /// Compare-and-set on the status column. `Ok(false)` means the item was
    /// not in `from` (already moved on, or missing) and nothing changed.
    async fn transition(&self, id: i64, from: NewsStatus, to: NewsStatus) -> Result<bool>;

    async fn mark_published(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

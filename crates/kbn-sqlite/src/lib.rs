//! SQLite adapter for the news store.
//!
//! One connection behind a mutex; every query runs on the blocking pool so
//! the async callers never stall the runtime.

mod schema;

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use kbn_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    news::{store::NewsStore, NewItem, NewSource, NewsItem, NewsSource, NewsStatus},
    Result,
};

const SOURCE_COLUMNS: &str = "id, name, url, title_selector, text_selector, image_selector, \
     check_interval_minutes, is_active, last_checked_at, created_at";

const ITEM_COLUMNS: &str = "id, source_id, url, original_title, original_text, \
     translated_title, translated_text, image_url, status, moderator_chat_id, \
     moderator_message_id, published_at, created_at";

#[derive(Clone)]
pub struct SqliteNewsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNewsStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(store_err)?;
        schema::apply_schema(&conn).map_err(store_err)?;
        info!(path = %path.display(), "news store opened");
        Ok(Self::from_conn(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        schema::apply_schema(&conn).map_err(store_err)?;
        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::Store("connection lock poisoned".to_string()))
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_ts_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn row_to_source(row: &Row<'_>) -> rusqlite::Result<NewsSource> {
    let created_at: String = row.get(9)?;
    Ok(NewsSource {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        title_selector: row.get(3)?,
        text_selector: row.get(4)?,
        image_selector: row.get(5)?,
        check_interval_minutes: row.get(6)?,
        is_active: row.get(7)?,
        last_checked_at: parse_ts_opt(8, row.get(8)?)?,
        created_at: parse_ts(9, &created_at)?,
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<NewsItem> {
    let status: String = row.get(8)?;
    let status = NewsStatus::from_db_str(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown status {status}").into(),
        )
    })?;
    let chat: Option<i64> = row.get(9)?;
    let message: Option<i32> = row.get(10)?;
    let moderator_message = match (chat, message) {
        (Some(c), Some(m)) => Some(MessageRef {
            chat_id: ChatId(c),
            message_id: MessageId(m),
        }),
        _ => None,
    };
    let created_at: String = row.get(12)?;
    Ok(NewsItem {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        original_title: row.get(3)?,
        original_text: row.get(4)?,
        translated_title: row.get(5)?,
        translated_text: row.get(6)?,
        image_url: row.get(7)?,
        status,
        moderator_message,
        published_at: parse_ts_opt(11, row.get(11)?)?,
        created_at: parse_ts(12, &created_at)?,
    })
}

fn select_item(conn: &Connection, id: i64) -> Result<Option<NewsItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM news_items WHERE id = ?1"),
        params![id],
        row_to_item,
    )
    .optional()
    .map_err(store_err)
}

fn expect_one(rows: usize, what: String) -> Result<()> {
    if rows == 0 {
        return Err(Error::NotFound(what));
    }
    Ok(())
}

#[async_trait]
impl NewsStore for SqliteNewsStore {
    async fn add_source(&self, source: NewSource) -> Result<NewsSource> {
        source.validate()?;
        let now = ts(Utc::now());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO news_sources (name, url, title_selector, text_selector, \
                 image_selector, check_interval_minutes, is_active, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    source.name.trim(),
                    source.url.trim(),
                    source.title_selector,
                    source.text_selector,
                    source.image_selector,
                    source.interval_minutes(),
                    source.is_active.unwrap_or(true),
                    now,
                ],
            )
            .map_err(store_err)?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM news_sources WHERE id = ?1"),
                params![id],
                row_to_source,
            )
            .map_err(store_err)
        })
        .await
    }

    async fn list_sources(&self, active_only: bool) -> Result<Vec<NewsSource>> {
        self.with_conn(move |conn| {
            let sql = if active_only {
                format!("SELECT {SOURCE_COLUMNS} FROM news_sources WHERE is_active = 1 ORDER BY id")
            } else {
                format!("SELECT {SOURCE_COLUMNS} FROM news_sources ORDER BY id")
            };
            let mut stmt = conn.prepare(&sql).map_err(store_err)?;
            let rows = stmt.query_map([], row_to_source).map_err(store_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
        })
        .await
    }

    async fn touch_source(&self, source_id: i64, checked_at: DateTime<Utc>) -> Result<()> {
        let at = ts(checked_at);
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE news_sources SET last_checked_at = ?1 WHERE id = ?2",
                    params![at, source_id],
                )
                .map_err(store_err)?;
            expect_one(rows, format!("news source {source_id}"))
        })
        .await
    }

    async fn item_exists(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM news_items WHERE url = ?1)",
                params![url],
                |r| r.get::<_, bool>(0),
            )
            .map_err(store_err)
        })
        .await
    }

    async fn insert_item(&self, item: NewItem) -> Result<Option<NewsItem>> {
        let now = ts(Utc::now());
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "INSERT INTO news_items (source_id, url, original_title, original_text, \
                     image_url, status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT(url) DO NOTHING",
                    params![
                        item.source_id,
                        item.url,
                        item.title,
                        item.text,
                        item.image_url,
                        NewsStatus::New.as_str(),
                        now,
                    ],
                )
                .map_err(store_err)?;
            if rows == 0 {
                debug!(url = %item.url, "duplicate news item skipped");
                return Ok(None);
            }
            select_item(conn, conn.last_insert_rowid())
        })
        .await
    }

    async fn get_item(&self, id: i64) -> Result<Option<NewsItem>> {
        self.with_conn(move |conn| select_item(conn, id)).await
    }

    async fn save_translation(&self, id: i64, title: &str, text: &str) -> Result<()> {
        let (title, text) = (title.to_string(), text.to_string());
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE news_items SET translated_title = ?1, translated_text = ?2 WHERE id = ?3",
                    params![title, text, id],
                )
                .map_err(store_err)?;
            expect_one(rows, format!("news item {id}"))
        })
        .await
    }

    async fn set_moderator_message(&self, id: i64, message: MessageRef) -> Result<()> {
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE news_items SET moderator_chat_id = ?1, moderator_message_id = ?2 \
                     WHERE id = ?3",
                    params![message.chat_id.0, message.message_id.0, id],
                )
                .map_err(store_err)?;
            expect_one(rows, format!("news item {id}"))
        })
        .await
    }

    async fn transition(&self, id: i64, from: NewsStatus, to: NewsStatus) -> Result<bool> {
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE news_items SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![to.as_str(), id, from.as_str()],
                )
                .map_err(store_err)?;
            Ok(rows == 1)
        })
        .await
    }

    async fn mark_published(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = ts(at);
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE news_items SET status = ?1, published_at = ?2 WHERE id = ?3",
                    params![NewsStatus::Published.as_str(), at, id],
                )
                .map_err(store_err)?;
            expect_one(rows, format!("news item {id}"))
        })
        .await
    }
}

//! SQLite DDL for the news store.

use rusqlite::Connection;

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS news_sources (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    name                   TEXT NOT NULL,
    url                    TEXT NOT NULL,
    title_selector         TEXT,
    text_selector          TEXT,
    image_selector         TEXT,
    check_interval_minutes INTEGER NOT NULL DEFAULT 60,
    is_active              INTEGER NOT NULL DEFAULT 1,
    last_checked_at        TEXT,               -- RFC 3339, UTC
    created_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS news_items (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id            INTEGER REFERENCES news_sources(id),
    url                  TEXT NOT NULL UNIQUE,
    original_title       TEXT NOT NULL,
    original_text        TEXT NOT NULL,
    translated_title     TEXT,
    translated_text      TEXT,
    image_url            TEXT,
    status               TEXT NOT NULL DEFAULT 'new',
    moderator_chat_id    INTEGER,
    moderator_message_id INTEGER,
    published_at         TEXT,
    created_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_status ON news_items(status);
CREATE INDEX IF NOT EXISTS idx_items_source ON news_items(source_id);
"#;

pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

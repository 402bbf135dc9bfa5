//! News sources, news items and the moderation lifecycle.

#[cfg(test)]
pub(crate) mod memory;
pub mod moderation;
pub mod store;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::MessageRef, errors::Error, Result};

pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;

/// Lifecycle of a [`NewsItem`].
///
/// `New` on insert, `PendingModeration` once the moderator has been notified,
/// then exactly one of the terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsStatus {
    New,
    PendingModeration,
    Published,
    Rejected,
}

impl NewsStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NewsStatus::New => "new",
            NewsStatus::PendingModeration => "pending_moderation",
            NewsStatus::Published => "published",
            NewsStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(NewsStatus::New),
            "pending_moderation" => Some(NewsStatus::PendingModeration),
            "published" => Some(NewsStatus::Published),
            "rejected" => Some(NewsStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewsSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub title_selector: Option<String>,
    pub text_selector: Option<String>,
    pub image_selector: Option<String>,
    pub check_interval_minutes: u32,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewsSource {
    /// Never checked, or the configured interval has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_checked_at {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    >= Duration::minutes(i64::from(self.check_interval_minutes))
            }
        }
    }
}

/// Payload of the `add_source` action.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewSource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub title_selector: Option<String>,
    pub text_selector: Option<String>,
    pub image_selector: Option<String>,
    pub check_interval_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

impl NewSource {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.url.trim().is_empty() {
            return Err(Error::Validation("name and url are required".to_string()));
        }
        url::Url::parse(self.url.trim())
            .map_err(|e| Error::Validation(format!("invalid source url: {e}")))?;
        if self.check_interval_minutes == Some(0) {
            return Err(Error::Validation(
                "check_interval_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval_minutes(&self) -> u32 {
        self.check_interval_minutes
            .unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewsItem {
    pub id: i64,
    pub source_id: Option<i64>,
    pub url: String,
    pub original_title: String,
    pub original_text: String,
    pub translated_title: Option<String>,
    pub translated_text: Option<String>,
    pub image_url: Option<String>,
    pub status: NewsStatus,
    #[serde(skip)]
    pub moderator_message: Option<MessageRef>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewsItem {
    /// Title to publish: the translation when present, else the original.
    pub fn display_title(&self) -> &str {
        self.translated_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.original_title)
    }

    pub fn display_text(&self) -> &str {
        self.translated_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.original_text)
    }
}

/// A candidate article about to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewItem {
    pub source_id: Option<i64>,
    pub url: String,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::sessions_csv::CsvSessionRow;

/// One recording, as stored in `sessions.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Unix seconds at start, as a string.
    pub id: String,
    #[serde(with = "local_iso")]
    pub start_time: NaiveDateTime,
    #[serde(with = "local_iso_opt")]
    pub end_time: Option<NaiveDateTime>,
    /// Whole seconds between start and stop.
    pub duration: u64,
    pub keys: Vec<String>,
    pub key_count: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_time: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            end_time: None,
            duration: 0,
            keys: Vec::new(),
            key_count: 0,
        }
    }
}

impl Session {
    /// Times are kept at the microsecond precision they are stored with, so
    /// a reloaded session compares equal to the in-memory one.
    pub fn begin(now: DateTime<Local>) -> Self {
        Self {
            id: now.timestamp().to_string(),
            start_time: now.naive_local().trunc_subsecs(6),
            ..Self::default()
        }
    }

    /// Close the session with the keys captured while it was open.
    pub fn finish(&mut self, now: DateTime<Local>, keys: Vec<String>) {
        let end = now.naive_local().trunc_subsecs(6);
        self.duration = end
            .signed_duration_since(self.start_time)
            .num_seconds()
            .max(0) as u64;
        self.end_time = Some(end);
        self.key_count = keys.len() as u64;
        self.keys = keys;
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn csv_row(&self) -> CsvSessionRow {
        CsvSessionRow {
            id: self.id.clone(),
            start: local_iso::format(&self.start_time),
            end: self.end_time.as_ref().map(local_iso::format),
            duration_secs: self.duration,
            key_count: self.key_count,
        }
    }
}

/// Cumulative per-key press counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyStats {
    counts: BTreeMap<String, u64>,
}

impl KeyStats {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut stats = Self::default();
        for s in sessions {
            stats.record(&s.keys);
        }
        stats
    }

    pub fn record(&mut self, keys: &[String]) {
        for k in keys {
            *self.counts.entry(k.clone()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Most pressed keys first; ties broken by key name.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> =
            self.counts.iter().map(|(k, c)| (k.clone(), *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

/// Local wall-clock timestamps without offset (`2025-03-01T10:15:00.123456`).
///
/// Reading also accepts RFC 3339 strings with an offset.
pub mod local_iso {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn format(t: &NaiveDateTime) -> String {
        t.format(FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        raw.parse::<NaiveDateTime>()
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.naive_local()))
    }

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

mod local_iso_opt {
    use chrono::NaiveDateTime;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::local_iso;

    pub fn serialize<S: Serializer>(t: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => local_iso::serialize(t, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => local_iso::parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

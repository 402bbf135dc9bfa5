use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatTarget, Result};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Typed configuration for the HTTP functions, the poller and the recorder.
///
/// Service credentials are optional on purpose: a missing token is reported by
/// the handler that needs it (HTTP 500), not at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: Option<String>,
    pub telegram_webhook_url: Option<String>,
    pub moderator_chat: Option<ChatTarget>,
    pub channel: Option<ChatTarget>,

    // Translation
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub source_language: String,
    pub target_language: String,
    pub translate_timeout: Duration,

    // Mail
    pub smtp: SmtpSettings,

    // Storage
    pub database_path: Option<PathBuf>,
    pub sessions_file: PathBuf,

    // Runtime
    pub http_bind: String,
    pub poll_loop_interval: Option<Duration>,
    pub fetch_timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// A complete SMTP configuration (host, user and password all present).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl SmtpSettings {
    pub fn complete(&self) -> Option<SmtpCredentials> {
        Some(SmtpCredentials {
            host: self.host.clone()?,
            port: self.port,
            user: self.user.clone()?,
            password: self.password.clone()?,
        })
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN");
        let telegram_webhook_url = get("TELEGRAM_WEBHOOK_URL");
        let moderator_chat = get("MODERATOR_CHAT_ID").and_then(|s| ChatTarget::parse(&s));
        let channel = get("TELEGRAM_CHANNEL_ID").and_then(|s| ChatTarget::parse(&s));

        let openai_api_key = get("OPENAI_API_KEY");
        let openai_base_url = get("OPENAI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let openai_model =
            get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let source_language =
            get("TRANSLATION_SOURCE_LANGUAGE").unwrap_or_else(|| "Russian".to_string());
        let target_language =
            get("TRANSLATION_TARGET_LANGUAGE").unwrap_or_else(|| "Meadow Mari".to_string());
        let translate_timeout =
            Duration::from_secs(parse_u64(get("TRANSLATE_TIMEOUT_SECS")).unwrap_or(30));

        let smtp = SmtpSettings {
            host: get("SMTP_HOST"),
            port: get("SMTP_PORT")
                .and_then(|s| s.trim().parse::<u16>().ok())
                .unwrap_or(587),
            user: get("SMTP_USER"),
            password: get("SMTP_PASSWORD"),
        };

        let database_path = get("DATABASE_PATH").map(PathBuf::from);
        let sessions_file = PathBuf::from(
            get("SESSIONS_FILE").unwrap_or_else(|| "sessions.json".to_string()),
        );

        let http_bind = get("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let poll_loop_interval = parse_u64(get("POLL_LOOP_SECONDS"))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let fetch_timeout =
            Duration::from_secs(parse_u64(get("FETCH_TIMEOUT_SECS")).unwrap_or(10));

        Ok(Self {
            telegram_bot_token,
            telegram_webhook_url,
            moderator_chat,
            channel,
            openai_api_key,
            openai_base_url,
            openai_model,
            source_language,
            target_language,
            translate_timeout,
            smtp,
            database_path,
            sessions_file,
            http_bind,
            poll_loop_interval,
            fetch_timeout,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::ChatId;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned()).unwrap()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = config_from(&[]);
        assert!(cfg.telegram_bot_token.is_none());
        assert!(cfg.openai_api_key.is_none());
        assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(cfg.openai_model, "gpt-4o-mini");
        assert_eq!(cfg.target_language, "Meadow Mari");
        assert_eq!(cfg.smtp.port, 587);
        assert!(cfg.smtp.complete().is_none());
        assert!(cfg.database_path.is_none());
        assert!(cfg.poll_loop_interval.is_none());
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(10));
        assert_eq!(cfg.sessions_file, PathBuf::from("sessions.json"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = config_from(&[("TELEGRAM_BOT_TOKEN", "   "), ("POLL_LOOP_SECONDS", "0")]);
        assert!(cfg.telegram_bot_token.is_none());
        assert!(cfg.poll_loop_interval.is_none());
    }

    #[test]
    fn parses_targets_and_smtp() {
        let cfg = config_from(&[
            ("MODERATOR_CHAT_ID", "-100500"),
            ("TELEGRAM_CHANNEL_ID", "@mari_news"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASSWORD", "secret"),
            ("OPENAI_BASE_URL", "http://localhost:9000/v1/"),
        ]);
        assert_eq!(cfg.moderator_chat, Some(ChatTarget::Id(ChatId(-100500))));
        assert_eq!(
            cfg.channel,
            Some(ChatTarget::Channel("@mari_news".to_string()))
        );
        let smtp = cfg.smtp.complete().unwrap();
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(cfg.openai_base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn dotenv_strips_quotes_and_comments() {
        let parsed = parse_dotenv("# comment\nA=1\nB=\"two\"\n C = 'three' \nbroken\n=nokey\n");
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "three".to_string()),
            ]
        );
    }
}

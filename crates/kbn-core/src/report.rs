//! Report mailer: turns the web client's session list into a CSV attachment
//! and submits it over SMTP through the [`MailTransport`] port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    config::SmtpCredentials,
    errors::Error,
    http::{str_field, HttpRequest, HttpResponse, Method},
    sessions_csv::{to_csv_string, CsvSessionRow},
    Result,
};

/// Session as posted by the web client (camelCase JSON).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSession {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "loose_u64")]
    pub duration: u64,
    #[serde(default, deserialize_with = "loose_u64")]
    pub key_count: u64,
}

impl From<&ReportSession> for CsvSessionRow {
    fn from(s: &ReportSession) -> Self {
        CsvSessionRow {
            id: s.id.clone(),
            start: s.start_time.clone(),
            end: s.end_time.clone().filter(|e| !e.is_empty()),
            duration_secs: s.duration,
            key_count: s.key_count,
        }
    }
}

// The client sends ids as numbers or strings depending on where they came from.
fn loose_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn loose_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: MailAttachment,
}

/// Mail submission port; `kbn-smtp` implements it with lettre.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, smtp: &SmtpCredentials, mail: OutgoingMail) -> Result<()>;
}

/// Build the report message for `sessions` as of `now`.
pub fn build_report_mail(
    from: &str,
    to: &str,
    sessions: &[ReportSession],
    now: DateTime<Local>,
) -> Result<OutgoingMail> {
    let rows: Vec<CsvSessionRow> = sessions.iter().map(CsvSessionRow::from).collect();
    let csv = to_csv_string(&rows)?;

    let body = format!(
        "Hello!\n\n\
         The attached CSV file contains the Keyboard Logger session history.\n\n\
         Total sessions: {}\n\
         Report generated: {}\n\n\
         Best regards,\n\
         Keyboard Logger\n",
        sessions.len(),
        now.format("%d.%m.%Y %H:%M"),
    );

    Ok(OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Keyboard Logger - Report from {}", now.format("%d.%m.%Y")),
        body,
        attachment: MailAttachment {
            filename: format!("keyboard-logger-{}.csv", now.format("%Y-%m-%d")),
            content_type: "text/csv".to_string(),
            bytes: csv.into_bytes(),
        },
    })
}

pub struct ReportMailer {
    smtp: Option<SmtpCredentials>,
    transport: Arc<dyn MailTransport>,
}

impl ReportMailer {
    pub fn new(smtp: Option<SmtpCredentials>, transport: Arc<dyn MailTransport>) -> Self {
        Self { smtp, transport }
    }

    pub async fn handle(&self, req: &HttpRequest) -> HttpResponse {
        match req.method {
            Method::Options => return HttpResponse::preflight("POST, OPTIONS"),
            Method::Post => {}
            _ => return HttpResponse::method_not_allowed(),
        }

        match self.send_report(req).await {
            Ok(to) => HttpResponse::json(
                200,
                &json!({ "success": true, "message": format!("Report sent to {to}") }),
            ),
            Err(e) => {
                error!("report failed: {e}");
                HttpResponse::from_error(&e)
            }
        }
    }

    async fn send_report(&self, req: &HttpRequest) -> Result<String> {
        let body = req.json_body()?;
        let email = str_field(&body, "email");
        let sessions: Vec<ReportSession> = match body.get("sessions") {
            Some(v @ Value::Array(_)) => serde_json::from_value(v.clone())
                .map_err(|e| Error::Validation(format!("invalid sessions: {e}")))?,
            _ => Vec::new(),
        };

        let Some(email) = email.filter(|_| !sessions.is_empty()) else {
            return Err(Error::Validation("Email and sessions are required".to_string()));
        };

        let smtp = self
            .smtp
            .as_ref()
            .ok_or_else(|| Error::Config("SMTP configuration incomplete".to_string()))?;

        let mail = build_report_mail(&smtp.user, &email, &sessions, Local::now())?;
        self.transport.send(smtp, mail).await?;

        info!(to = %email, sessions = sessions.len(), "report sent");
        Ok(email)
    }
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::testing::RecordingTransport;
    use super::*;
    use crate::sessions_csv::parse_csv;

    fn creds() -> SmtpCredentials {
        SmtpCredentials {
            host: "smtp.example.com".into(),
            port: 587,
            user: "bot@example.com".into(),
            password: "secret".into(),
        }
    }

    fn body() -> String {
        json!({
            "email": "boss@example.com",
            "sessions": [
                {"id": 1740823200, "startTime": "2025-03-01T10:00:00", "endTime": "2025-03-01T10:05:00", "duration": 300, "keyCount": 42},
                {"id": "1740826800", "startTime": "2025-03-01T11:00:00", "duration": 12.4, "keyCount": 0}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn sends_report_with_csv_attachment() {
        let transport = Arc::new(RecordingTransport::default());
        let mailer = ReportMailer::new(Some(creds()), transport.clone());

        let res = mailer.handle(&HttpRequest::new("POST", body())).await;
        assert_eq!(res.status, 200);
        let v = res.json_value().unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["message"], "Report sent to boss@example.com");

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        let mail = &sent[0];
        assert_eq!(mail.from, "bot@example.com");
        assert_eq!(mail.to, "boss@example.com");
        assert!(mail.subject.starts_with("Keyboard Logger - Report from "));
        assert!(mail.body.contains("Total sessions: 2"));

        let rows = parse_csv(std::str::from_utf8(&mail.attachment.bytes).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "1740823200");
        assert_eq!(rows[0].key_count, 42);
        assert_eq!(rows[1].end, None);
        assert_eq!(rows[1].duration_secs, 12);
    }

    #[tokio::test]
    async fn missing_email_or_sessions_is_400() {
        let mailer = ReportMailer::new(Some(creds()), Arc::new(RecordingTransport::default()));
        for payload in [
            json!({"sessions": [{"id": 1}]}),
            json!({"email": "a@b.c", "sessions": []}),
            json!({"email": "a@b.c"}),
        ] {
            let res = mailer
                .handle(&HttpRequest::new("POST", payload.to_string()))
                .await;
            assert_eq!(res.status, 400);
            assert_eq!(res.json_value().unwrap()["error"], "Email and sessions are required");
        }
    }

    #[tokio::test]
    async fn incomplete_smtp_is_500() {
        let mailer = ReportMailer::new(None, Arc::new(RecordingTransport::default()));
        let res = mailer.handle(&HttpRequest::new("POST", body())).await;
        assert_eq!(res.status, 500);
        assert_eq!(res.json_value().unwrap()["error"], "SMTP configuration incomplete");
    }

    #[tokio::test]
    async fn transport_failure_is_500() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let mailer = ReportMailer::new(Some(creds()), transport);
        let res = mailer.handle(&HttpRequest::new("POST", body())).await;
        assert_eq!(res.status, 500);
        assert!(res.json_value().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("authentication failed"));
    }

    #[tokio::test]
    async fn method_handling() {
        let mailer = ReportMailer::new(None, Arc::new(RecordingTransport::default()));
        let res = mailer.handle(&HttpRequest::new("OPTIONS", "")).await;
        assert_eq!(res.status, 200);
        assert!(res.body.is_empty());

        let res = mailer.handle(&HttpRequest::new("GET", "")).await;
        assert_eq!(res.status, 405);
        assert_eq!(res.json_value().unwrap()["error"], "Method not allowed");
    }

    #[test]
    fn mail_names_follow_the_date() {
        let now = Local.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap();
        let mail = build_report_mail("f@x", "t@x", &[ReportSession::default()], now).unwrap();
        assert_eq!(mail.subject, "Keyboard Logger - Report from 07.03.2025");
        assert_eq!(mail.attachment.filename, "keyboard-logger-2025-03-07.csv");
        assert!(mail.body.contains("Report generated: 07.03.2025 09:30"));
    }
}

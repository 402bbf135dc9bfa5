use serde_json::{json, Value};
use tracing::{error, warn};

use crate::{
    errors::Error,
    http::{str_field, HttpRequest, HttpResponse, Method},
    messaging::webhook::parse_update,
    news::NewSource,
    Result,
};

use super::{NewsBot, PublishRequest};

impl NewsBot {
    /// Entry point of the `/news` endpoint.
    pub async fn handle(&self, req: &HttpRequest) -> HttpResponse {
        match req.method {
            Method::Options => HttpResponse::preflight("GET, POST, OPTIONS"),
            Method::Get => HttpResponse::json(200, &self.status()),
            Method::Post => {
                let body = match req.json_body() {
                    Ok(b) => b,
                    Err(e) => return HttpResponse::from_error(&e),
                };
                let action = str_field(&body, "action").unwrap_or_else(|| "parse".to_string());
                match self.dispatch(&action, &body).await {
                    Ok(res) => res,
                    Err(e) => {
                        if e.http_status() >= 500 {
                            error!(%action, "news action failed: {e}");
                        } else {
                            warn!(%action, "news action rejected: {e}");
                        }
                        HttpResponse::from_error(&e)
                    }
                }
            }
            Method::Other => HttpResponse::method_not_allowed(),
        }
    }

    async fn dispatch(&self, action: &str, body: &Value) -> Result<HttpResponse> {
        match action {
            "parse" => {
                let url = str_field(body, "url")
                    .ok_or_else(|| Error::Validation("URL is required".to_string()))?;
                let parsed = self.parse(&url).await?;
                Ok(HttpResponse::json(200, &parsed.to_json()))
            }
            "publish" => {
                // Missing credentials are reported before a missing target.
                self.messenger()?;
                let req = PublishRequest::from_json(body)?;
                let msg = self.publish(&req).await?;
                Ok(HttpResponse::json(
                    200,
                    &json!({
                        "success": true,
                        "message_id": msg.message_id.0,
                        "chat_id": msg.chat_id.0,
                    }),
                ))
            }
            "webhook" => {
                if let Some(update) = parse_update(body) {
                    self.handle_update(update).await;
                }
                Ok(HttpResponse::text(200, "ok"))
            }
            "add_source" => {
                let source: NewSource = serde_json::from_value(body.clone())
                    .map_err(|e| Error::Validation(format!("invalid source: {e}")))?;
                let created = self.add_source(source).await?;
                Ok(HttpResponse::json(
                    200,
                    &json!({ "success": true, "source": created }),
                ))
            }
            "check_sources" => {
                let summary = self.check_sources().await?;
                Ok(HttpResponse::json(
                    200,
                    &json!({ "success": true, "summary": summary }),
                ))
            }
            other => Err(Error::Validation(format!("Unknown action: {other}"))),
        }
    }

    fn status(&self) -> Value {
        let mut endpoints = serde_json::Map::new();
        endpoints.insert("POST parse".into(), json!("Parse and translate a news article"));
        endpoints.insert("POST publish".into(), json!("Publish a post to Telegram"));
        endpoints.insert("POST webhook".into(), json!("Telegram webhook"));
        if self.is_store_backed() {
            endpoints.insert("POST add_source".into(), json!("Register a news source"));
            endpoints.insert("POST check_sources".into(), json!("Poll due news sources"));
        }
        json!({
            "status": "ok",
            "message": "Telegram News Bot API",
            "moderation": self.is_store_backed(),
            "endpoints": endpoints,
        })
    }
}

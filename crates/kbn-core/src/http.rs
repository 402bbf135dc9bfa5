//! Framework-agnostic request/response envelope for the HTTP functions.
//!
//! The `kbn` server converts axum requests into [`HttpRequest`] so every
//! handler stays testable without a running server.

use serde_json::{json, Value};

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: &str, body: impl Into<String>) -> Self {
        Self {
            method: Method::parse(method),
            body: body.into(),
        }
    }

    /// Parse the body as a JSON object; an empty body is `{}`.
    pub fn json_body(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(json!({}));
        }
        let v: Value = serde_json::from_str(&self.body)
            .map_err(|e| Error::Validation(format!("invalid JSON body: {e}")))?;
        if !v.is_object() {
            return Err(Error::Validation("request body must be a JSON object".to_string()));
        }
        Ok(v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// CORS preflight answer: 200 with an empty body.
    pub fn preflight(allowed_methods: &str) -> Self {
        Self {
            status: 200,
            headers: vec![
                header("Access-Control-Allow-Origin", "*"),
                header("Access-Control-Allow-Methods", allowed_methods),
                header("Access-Control-Allow-Headers", "Content-Type, X-User-Id"),
                header("Access-Control-Max-Age", "86400"),
            ],
            body: String::new(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![
                header("Content-Type", "application/json"),
                header("Access-Control-Allow-Origin", "*"),
            ],
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    pub fn from_error(err: &Error) -> Self {
        Self::error(err.http_status(), &err.to_string())
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, "Method not allowed")
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![header("Content-Type", "text/plain")],
            body: body.to_string(),
        }
    }

    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// `body[key]` as a trimmed non-empty string.
pub fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

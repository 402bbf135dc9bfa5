//! OpenAI adapter (chat-completions translation).
//!
//! Any OpenAI-compatible endpoint works; the base URL and model come from
//! configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use kbn_core::{
    errors::Error,
    translate::{TranslationPrompt, Translator},
    Result,
};

const TEMPERATURE: f64 = 0.3;

#[derive(Clone, Debug)]
pub struct OpenAiTranslator {
    api_key: String,
    base_url: String,
    model: String,
    prompt: TranslationPrompt,
    http: reqwest::Client,
}

impl OpenAiTranslator {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        prompt: TranslationPrompt,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("openai client build failed: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            prompt,
            http,
        })
    }

    fn request_body(&self, text: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.prompt.system_prompt() },
                { "role": "user", "content": self.prompt.user_prompt(text) },
            ],
            "temperature": TEMPERATURE,
        })
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| Error::External(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "openai translation failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("openai json error: {e}")))?;

        let content = v
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::External("openai response has no choices".to_string()))?;

        debug!(chars = content.chars().count(), "translation received");
        Ok(content.trim().to_string())
    }
}

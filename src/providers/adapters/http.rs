//! OpenAI-compatible HTTP adapter (`/v1/models`, `/v1/chat/completions`).
//!
//! Covers hosted endpoints and local servers (Ollama, LM Studio) that speak
//! the same protocol. Abandonment on timeout is real here: dropping the
//! in-flight future cancels the underlying request.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::providers::{GenerationOptions, TextProvider};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A provider backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// Probe `GET /models`. Unreachable, slow, or rejected all count as
    /// not available.
    async fn is_available(&self) -> bool {
        let req = self.authorize(self.client.get(self.url("models")).timeout(PROBE_TIMEOUT));
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(provider = %self.name, err = %err, "probe failed");
                false
            }
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> anyhow::Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let resp = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "{} returned HTTP {}: {}",
                self.name,
                status.as_u16(),
                detail.trim()
            );
        }

        let payload: Value = resp
            .json()
            .await
            .context("response body was not valid JSON")?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .context("response carried no choices[0].message.content")?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let provider = OpenAiCompatProvider::new(
            "local",
            "http://localhost:11434/v1/",
            "llama3",
            None,
        )
        .unwrap();
        assert_eq!(provider.url("models"), "http://localhost:11434/v1/models");
        assert_eq!(
            provider.url("/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn api_key_is_optional() {
        assert!(OpenAiCompatProvider::new("hosted", "https://api.example.com/v1", "gpt", None)
            .is_ok());
        assert!(OpenAiCompatProvider::new(
            "hosted",
            "https://api.example.com/v1",
            "gpt",
            Some("sk-test".to_string()),
        )
        .is_ok());
    }
}

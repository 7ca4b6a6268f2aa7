use super::LanguageModel;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Self-hosted Ollama backend using the native `/api/chat` endpoint
pub struct OllamaModel {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: super::http_client(timeout)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": { "temperature": 0 },
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Ollama request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("Ollama chat API error ({}): {}", status, error_text)));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Ollama response unreadable: {}", e)))?;

        json.pointer("/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Generation("Ollama response missing message content".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

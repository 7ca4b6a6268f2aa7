use super::LanguageModel;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Hosted chat-completions backend
pub struct OpenAiModel {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: super::http_client(timeout)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("OpenAI request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("OpenAI chat API error ({}): {}", status, error_text)));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("OpenAI response unreadable: {}", e)))?;

        // Parse choices[0].message.content
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Generation("OpenAI API response missing content".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

//! Query Generator - language-model backends and output cleaning

pub mod clean;
pub mod ollama;
pub mod openai;

pub use clean::clean;
pub use ollama::OllamaModel;
pub use openai::OpenAiModel;

use crate::config::LlmBackend;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A text-completion backend.
///
/// Implementations report every failure as `Error::Generation` and never
/// retry on their own.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

/// Build the backend selected by configuration
pub fn from_config(backend: &LlmBackend, timeout: Duration) -> Result<Arc<dyn LanguageModel>> {
    Ok(match backend {
        LlmBackend::OpenAi {
            api_key,
            model,
            base_url,
        } => Arc::new(OpenAiModel::new(base_url, api_key, model, timeout)?),
        LlmBackend::Ollama { base_url, model } => Arc::new(OllamaModel::new(base_url, model, timeout)?),
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| crate::Error::Config(format!("cannot build HTTP client: {}", e)))
}

/// Model invocation followed by output cleaning
#[derive(Clone)]
pub struct QueryGenerator {
    model: Arc<dyn LanguageModel>,
}

impl QueryGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Ask the model for SQL and return it cleaned.
    ///
    /// Output that cleans down to nothing is a generation failure.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let raw = self.model.invoke(prompt).await?;
        tracing::debug!("{} returned {} chars", self.model.provider_name(), raw.len());
        let sql = clean(&raw);
        if sql.is_empty() {
            return Err(crate::Error::Generation("model returned no SQL".to_string()));
        }
        Ok(sql)
    }

    pub fn provider_name(&self) -> &'static str {
        self.model.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Canned(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl LanguageModel for Canned {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|e| Error::Generation(e.to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_generate_cleans_output() {
        let generator = QueryGenerator::new(Arc::new(Canned(Ok(
            "SQLQuery: ```sql\nSELECT 類別, AVG(銷售額) FROM \"sales\" GROUP BY 類別\n```",
        ))));
        let sql = generator.generate("prompt").await.unwrap();
        assert_eq!(sql, "SELECT 類別, AVG(銷售額) FROM \"sales\" GROUP BY 類別");
    }

    #[tokio::test]
    async fn test_generate_passes_failures_through() {
        let generator = QueryGenerator::new(Arc::new(Canned(Err("connection refused"))));
        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Generation(ref m) if m == "connection refused"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_blank_output_is_generation_error() {
        for reply in ["", "   ", "```sql\n```", "SQLQuery:"] {
            let generator = QueryGenerator::new(Arc::new(Canned(Ok(reply))));
            let err = generator.generate("prompt").await.unwrap_err();
            assert!(matches!(err, Error::Generation(ref m) if m == "model returned no SQL"), "reply: {:?}", reply);
        }
    }
}

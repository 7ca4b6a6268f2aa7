use crate::config::EmbeddingBackend;
use crate::{Error, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Turns text into vectors for similarity search
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_id(&self) -> &str;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(Error::Embedding("backend returned no vector".to_string()));
        }
        Ok(vectors.remove(0))
    }
}

/// Build the embedder selected by configuration
pub fn from_config(backend: &EmbeddingBackend, timeout: Duration) -> Result<Arc<dyn Embedder>> {
    Ok(match backend {
        EmbeddingBackend::Ollama { base_url, model } => {
            Arc::new(OllamaEmbedder::new(base_url, model, timeout)?)
        }
        EmbeddingBackend::Local => Arc::new(LocalEmbedder::new()?),
    })
}

/// Embeddings from a local transformer model
pub struct LocalEmbedder {
    model: Arc<TextEmbedding>,
}

impl LocalEmbedder {
    /// Load the default model (downloaded on first use)
    pub fn new() -> Result<Self> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self { model: Arc::new(model) })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model = Arc::clone(&self.model);
        let inputs = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed(inputs, None))
            .await
            .map_err(|e| Error::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| Error::Embedding(format!("Embedding generation failed: {}", e)))
    }

    fn model_id(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}

/// Embeddings from an Ollama server (`/api/embed`)
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: crate::llm::http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Ollama embed request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama embed API error ({}): {}", status, error_text)));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Ollama embed response malformed: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }
        Ok(parsed.embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

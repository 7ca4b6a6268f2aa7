//! Process configuration
//!
//! Settings are resolved once at startup into an immutable [`Config`] and
//! passed into each component's constructor. Every key can come from the
//! environment (`DB_URL`, `LLM_TYPE`, ...) or from an optional TOML file using
//! the lower-cased key (`db_url = "sqlite://shop.db"`). The environment wins.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_SAMPLE_ROWS: usize = 3;
pub const DEFAULT_MEMORY_ERROR_CHARS: usize = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CORPUS_DIR: &str = "./rags";

/// Language-model backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    /// Hosted chat-completions API keyed by an API key
    OpenAi {
        api_key: String,
        model: String,
        base_url: String,
    },
    /// Self-hosted Ollama endpoint
    Ollama { base_url: String, model: String },
}

impl LlmBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi { .. } => "openai",
            LlmBackend::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmBackend::OpenAi { model, .. } | LlmBackend::Ollama { model, .. } => model,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Ollama { base_url: String, model: String },
    /// In-process transformer model (all-MiniLM-L6-v2)
    Local,
}

/// Whether the exemplar is retrieved once per cycle or re-picked per attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExemplarPolicy {
    #[default]
    Reuse,
    PerAttempt,
}

impl FromStr for ExemplarPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" | "once" => Ok(ExemplarPolicy::Reuse),
            "per-attempt" | "per_attempt" | "attempt" => Ok(ExemplarPolicy::PerAttempt),
            other => Err(Error::Config(format!("unknown EXEMPLAR_POLICY: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm: LlmBackend,
    pub embedding: EmbeddingBackend,
    pub corpus_dir: PathBuf,
    pub max_retries: usize,
    /// Row-limit hint embedded in every prompt
    pub top_k: usize,
    /// Sample rows per table in the schema description
    pub sample_rows: usize,
    /// Error text is cut to this many characters when fed back into a prompt
    pub memory_error_chars: usize,
    pub exemplar_policy: ExemplarPolicy,
    pub request_timeout: Duration,
}

impl Config {
    /// Resolve the configuration from the environment, layered over the
    /// optional config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = load_config_file(path)?.unwrap_or_default();
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key)))
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        let database_url = require("DB_URL")?;

        let llm_type = get("LLM_TYPE").unwrap_or_else(|| "OPENAI".to_string());
        let llm = match llm_type.to_ascii_uppercase().as_str() {
            "OPENAI" => LlmBackend::OpenAi {
                api_key: require("OPENAI_API_KEY")?,
                model: require("OPENAI_MODEL")?,
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            },
            "OLLAMA" => LlmBackend::Ollama {
                base_url: require("OLLAMA_URL")?,
                model: require("OLLAMA_MODEL")?,
            },
            other => return Err(Error::Config(format!("unsupported LLM_TYPE: {}", other))),
        };

        let embedding_type = get("EMBEDDING_TYPE").unwrap_or_else(|| "OLLAMA".to_string());
        let embedding = match embedding_type.to_ascii_uppercase().as_str() {
            "OLLAMA" => EmbeddingBackend::Ollama {
                base_url: require("OLLAMA_EMBEDDING_URL")?,
                model: require("OLLAMA_EMBEDDING_MODEL")?,
            },
            "LOCAL" => EmbeddingBackend::Local,
            other => {
                return Err(Error::Config(format!("unsupported EMBEDDING_TYPE: {}", other)));
            }
        };

        let max_retries = parse_number(get("MAX_RETRIES"), "MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        if max_retries == 0 {
            return Err(Error::Config("MAX_RETRIES must be at least 1".to_string()));
        }

        let exemplar_policy = match get("EXEMPLAR_POLICY") {
            Some(v) => v.parse()?,
            None => ExemplarPolicy::default(),
        };

        Ok(Self {
            database_url,
            llm,
            embedding,
            corpus_dir: get("RAG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_DIR)),
            max_retries,
            top_k: parse_number(get("TOP_K"), "TOP_K", DEFAULT_TOP_K)?,
            sample_rows: parse_number(get("SAMPLE_ROWS"), "SAMPLE_ROWS", DEFAULT_SAMPLE_ROWS)?,
            memory_error_chars: parse_number(
                get("MEMORY_ERROR_CHARS"),
                "MEMORY_ERROR_CHARS",
                DEFAULT_MEMORY_ERROR_CHARS,
            )?,
            exemplar_policy,
            request_timeout: Duration::from_secs(parse_number(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse_number<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got {:?}", key, v))),
        None => Ok(default),
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("askql.toml")
}

/// On-disk form of the configuration; keys are the lower-cased variable names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub db_url: Option<String>,
    pub llm_type: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub embedding_type: Option<String>,
    pub ollama_embedding_url: Option<String>,
    pub ollama_embedding_model: Option<String>,
    pub rag_dir: Option<String>,
    pub max_retries: Option<usize>,
    pub top_k: Option<usize>,
    pub sample_rows: Option<usize>,
    pub memory_error_chars: Option<usize>,
    pub exemplar_policy: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Starting point written by `askql init`
    pub fn template() -> Self {
        Self {
            db_url: Some("sqlite://data.db".to_string()),
            llm_type: Some("OPENAI".to_string()),
            openai_api_key: Some(String::new()),
            openai_model: Some("gpt-4o-mini".to_string()),
            embedding_type: Some("OLLAMA".to_string()),
            ollama_embedding_url: Some("http://127.0.0.1:11434".to_string()),
            ollama_embedding_model: Some("nomic-embed-text".to_string()),
            rag_dir: Some(DEFAULT_CORPUS_DIR.to_string()),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            top_k: Some(DEFAULT_TOP_K),
            exemplar_policy: Some("reuse".to_string()),
            ..Self::default()
        }
    }

    /// Value for an environment-style key such as `DB_URL`
    pub fn get(&self, key: &str) -> Option<String> {
        let number = |n: Option<usize>| n.map(|n| n.to_string());
        match key {
            "DB_URL" => self.db_url.clone(),
            "LLM_TYPE" => self.llm_type.clone(),
            "OPENAI_API_KEY" => self.openai_api_key.clone(),
            "OPENAI_MODEL" => self.openai_model.clone(),
            "OPENAI_BASE_URL" => self.openai_base_url.clone(),
            "OLLAMA_URL" => self.ollama_url.clone(),
            "OLLAMA_MODEL" => self.ollama_model.clone(),
            "EMBEDDING_TYPE" => self.embedding_type.clone(),
            "OLLAMA_EMBEDDING_URL" => self.ollama_embedding_url.clone(),
            "OLLAMA_EMBEDDING_MODEL" => self.ollama_embedding_model.clone(),
            "RAG_DIR" => self.rag_dir.clone(),
            "MAX_RETRIES" => number(self.max_retries),
            "TOP_K" => number(self.top_k),
            "SAMPLE_ROWS" => number(self.sample_rows),
            "MEMORY_ERROR_CHARS" => number(self.memory_error_chars),
            "EXEMPLAR_POLICY" => self.exemplar_policy.clone(),
            "REQUEST_TIMEOUT_SECS" => self.request_timeout_secs.map(|n| n.to_string()),
            _ => None,
        }
    }
}

/// Read the config file. A missing file is not an error.
pub fn load_config_file(path: Option<&Path>) -> Result<Option<FileConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: FileConfig = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &FileConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const OPENAI: &[(&str, &str)] = &[
        ("DB_URL", "sqlite://shop.db"),
        ("OPENAI_API_KEY", "sk-test"),
        ("OPENAI_MODEL", "gpt-4o-mini"),
        ("OLLAMA_EMBEDDING_URL", "http://localhost:11434"),
        ("OLLAMA_EMBEDDING_MODEL", "nomic-embed-text"),
    ];

    #[test]
    fn test_defaults_to_openai() {
        let config = Config::from_lookup(lookup(OPENAI)).unwrap();
        assert_eq!(config.llm.kind(), "openai");
        assert_eq!(config.llm.model(), "gpt-4o-mini");
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.top_k, 20);
        assert_eq!(config.exemplar_policy, ExemplarPolicy::Reuse);
        assert_eq!(config.corpus_dir, PathBuf::from("./rags"));
    }

    #[test]
    fn test_missing_db_url() {
        let err = Config::from_lookup(lookup(&OPENAI[1..])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("DB_URL")));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut pairs = OPENAI.to_vec();
        pairs[1] = ("OPENAI_API_KEY", "  ");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_ollama_backend() {
        let mut pairs = OPENAI.to_vec();
        pairs.push(("LLM_TYPE", "ollama"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err()); // needs OLLAMA_URL

        pairs.push(("OLLAMA_URL", "http://gpu-box:11434"));
        pairs.push(("OLLAMA_MODEL", "qwen2.5"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.llm,
            LlmBackend::Ollama {
                base_url: "http://gpu-box:11434".into(),
                model: "qwen2.5".into()
            }
        );
    }

    #[test]
    fn test_unsupported_llm_type() {
        let mut pairs = OPENAI.to_vec();
        pairs.push(("LLM_TYPE", "CLAUDIUS"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("unsupported LLM_TYPE"));
    }

    #[test]
    fn test_local_embeddings_need_no_url() {
        let pairs = [
            ("DB_URL", "shop.db"),
            ("OPENAI_API_KEY", "k"),
            ("OPENAI_MODEL", "m"),
            ("EMBEDDING_TYPE", "local"),
        ];
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.embedding, EmbeddingBackend::Local);
    }

    #[test]
    fn test_numeric_overrides() {
        let mut pairs = OPENAI.to_vec();
        pairs.push(("MAX_RETRIES", "5"));
        pairs.push(("EXEMPLAR_POLICY", "per-attempt"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.exemplar_policy, ExemplarPolicy::PerAttempt);

        pairs.push(("TOP_K", "many"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut pairs = OPENAI.to_vec();
        pairs.push(("MAX_RETRIES", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_config_file_values_feed_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("askql.toml");
        std::fs::write(&path, "db_url = \"sqlite://x.db\"\nmax_retries = 4\n").unwrap();

        let file = load_config_file(Some(&path)).unwrap().unwrap();
        assert_eq!(file.get("DB_URL").as_deref(), Some("sqlite://x.db"));
        assert_eq!(file.get("MAX_RETRIES").as_deref(), Some("4"));
        assert_eq!(file.get("TOP_K"), None);

        assert!(load_config_file(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("askql.toml");
        std::fs::write(&path, "db_uri = \"sqlite://x.db\"\n").unwrap();
        assert!(matches!(load_config_file(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("askql.toml");
        write_config(&path, &FileConfig::template(), false).unwrap();
        assert!(write_config(&path, &FileConfig::template(), false).is_err());
        write_config(&path, &FileConfig::template(), true).unwrap();

        let file = load_config_file(Some(&path)).unwrap().unwrap();
        assert_eq!(file, FileConfig::template());
        assert_eq!(file.get("LLM_TYPE").as_deref(), Some("OPENAI"));
    }
}

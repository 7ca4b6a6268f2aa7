//! # askql - natural-language questions against a SQL database
//!
//! A question goes through a bounded retry loop:
//! - the closest stored exemplar (question -> SQL) is retrieved by embedding similarity
//! - a prompt is composed from the schema, the question, the exemplar and the
//!   failures seen so far in this cycle
//! - a language model writes SQL, which is cleaned and executed
//! - failures are fed back into the next attempt until the retry budget runs out
//!
//! The result set is normalized into a plain table for presentation.

pub mod config;
pub mod exemplar;
pub mod prompt;
pub mod llm;
pub mod database;
pub mod normalize;
pub mod controller;
pub mod server;
pub mod ui;

// Re-exports for convenient access
pub use config::Config;
pub use controller::{Attempt, CycleEvent, CycleOutcome, EventSink, Memory, RetryController};
pub use database::{Database, RawResult, RawValue, SchemaInfo, SqliteDatabase};
pub use exemplar::{Exemplar, ExampleStore, MemoryExampleStore};
pub use llm::{LanguageModel, QueryGenerator};
pub use normalize::{Cell, Table};

/// Result type alias for askql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for askql operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Prompt composition error: {0}")]
    Composition(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("{message}")]
    Execution { message: String },

    #[error("Result processing error: {0}")]
    Normalization(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the retry loop may spend another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Generation(_) | Error::Execution { .. })
    }
}

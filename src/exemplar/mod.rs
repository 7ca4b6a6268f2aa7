//! Example Store - question/answer exemplars retrieved by semantic similarity
//!
//! The store is filled once at startup from a corpus directory and then only
//! read. Retrieval ranks exemplars by cosine similarity between the embedded
//! user question and each embedded exemplar question.

pub mod corpus;
pub mod embedding;
pub mod store;

pub use corpus::{load_corpus, CorpusReport};
pub use embedding::{Embedder, LocalEmbedder, OllamaEmbedder};
pub use store::{ExampleStore, MemoryExampleStore, ScoredExemplar};

use serde::{Deserialize, Serialize};

/// A stored question and the SQL that answers it, used as a few-shot hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exemplar {
    pub question: String,
    pub answer: String,
}

impl Exemplar {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

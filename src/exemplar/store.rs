use super::{Embedder, Exemplar};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Exemplar with its similarity to a query
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScoredExemplar {
    pub exemplar: Exemplar,
    pub score: f32,
}

/// Capability interface of an exemplar index.
///
/// Indexing happens before the store is shared; afterwards only the lookup
/// methods are used, from any number of cycles at once.
#[async_trait]
pub trait ExampleStore: Send + Sync {
    /// Add exemplars to the index, returning how many were new
    async fn index(&mut self, corpus: Vec<Exemplar>) -> Result<usize>;

    /// Up to `limit` exemplars ordered by descending similarity
    async fn nearest(&self, question: &str, limit: usize) -> Result<Vec<ScoredExemplar>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single closest exemplar, or `None` for an empty index
    async fn lookup(&self, question: &str) -> Result<Option<Exemplar>> {
        Ok(self
            .nearest(question, 1)
            .await?
            .into_iter()
            .next()
            .map(|scored| scored.exemplar))
    }
}

struct IndexedExemplar {
    exemplar: Exemplar,
    vector: Vec<f32>,
}

/// In-process vector index with brute-force cosine ranking
pub struct MemoryExampleStore {
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexedExemplar>,
    seen: HashSet<Exemplar>,
}

impl MemoryExampleStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

#[async_trait]
impl ExampleStore for MemoryExampleStore {
    async fn index(&mut self, corpus: Vec<Exemplar>) -> Result<usize> {
        let mut fresh = Vec::new();
        for exemplar in corpus {
            if self.seen.insert(exemplar.clone()) {
                fresh.push(exemplar);
            }
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        let questions: Vec<String> = fresh.iter().map(|e| e.question.clone()).collect();
        let vectors = match self.embedder.embed(&questions).await {
            Ok(vectors) => vectors,
            Err(e) => {
                // keep the dedup set in sync with what is actually indexed
                for exemplar in &fresh {
                    self.seen.remove(exemplar);
                }
                return Err(e);
            }
        };
        if vectors.len() != fresh.len() {
            for exemplar in &fresh {
                self.seen.remove(exemplar);
            }
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                fresh.len(),
                vectors.len()
            )));
        }

        let added = fresh.len();
        self.entries.extend(
            fresh
                .into_iter()
                .zip(vectors)
                .map(|(exemplar, vector)| IndexedExemplar { exemplar, vector }),
        );
        tracing::debug!("Indexed {} exemplars ({} total) with {}", added, self.entries.len(), self.embedder.model_id());
        Ok(added)
    }

    async fn nearest(&self, question: &str, limit: usize) -> Result<Vec<ScoredExemplar>> {
        if self.entries.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let query = self.embedder.embed_one(question).await?;

        let mut scored: Vec<ScoredExemplar> = self
            .entries
            .iter()
            .map(|entry| ScoredExemplar {
                exemplar: entry.exemplar.clone(),
                score: cosine_similarity(&query, &entry.vector),
            })
            .collect();

        // Sort by score descending; ties keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cosine similarity; mismatched or zero-norm vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts characters into a fixed number of buckets; similar strings get
    /// similar vectors.
    pub(crate) struct CharEmbedder {
        pub calls: AtomicUsize,
    }

    impl CharEmbedder {
        pub(crate) fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Embedder for CharEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 64];
                    for c in t.chars() {
                        v[(c as usize) % 64] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn model_id(&self) -> &str {
            "char-buckets"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("offline".to_string()))
        }

        fn model_id(&self) -> &str {
            "offline"
        }
    }

    fn corpus() -> Vec<Exemplar> {
        vec![
            Exemplar::new("average price per category", "SELECT category, AVG(price) FROM \"items\" GROUP BY category"),
            Exemplar::new("list all customers", "SELECT name FROM \"customers\""),
            Exemplar::new("total sales per item", "SELECT item, SUM(amount) FROM \"sales\" GROUP BY item"),
        ]
    }

    #[tokio::test]
    async fn test_lookup_empty_store() {
        let store = MemoryExampleStore::new(Arc::new(CharEmbedder::new()));
        assert!(store.is_empty());
        assert_eq!(store.lookup("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_returns_closest() {
        let mut store = MemoryExampleStore::new(Arc::new(CharEmbedder::new()));
        assert_eq!(store.index(corpus()).await.unwrap(), 3);

        let best = store.lookup("list all customers please").await.unwrap().unwrap();
        assert_eq!(best.question, "list all customers");

        let ranked = store.nearest("total sales per item", 3).await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].exemplar.question, "total sales per item");
        assert!((ranked[0].score - 1.0).abs() < 1e-5);
        assert!(ranked[0].score >= ranked[1].score && ranked[1].score >= ranked[2].score);
    }

    #[tokio::test]
    async fn test_index_is_idempotent() {
        let embedder = Arc::new(CharEmbedder::new());
        let mut store = MemoryExampleStore::new(embedder.clone());

        store.index(corpus()).await.unwrap();
        assert_eq!(store.index(corpus()).await.unwrap(), 0);
        assert_eq!(store.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_index_leaves_store_unchanged() {
        let mut store = MemoryExampleStore::new(Arc::new(FailingEmbedder));
        assert!(store.index(corpus()).await.is_err());
        assert_eq!(store.len(), 0);
        assert!(store.seen.is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}

//! Cycle-scoped failure memory

use serde::Serialize;

/// One failed generate -> execute round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// The cleaned SQL, or `None` when generation itself failed
    pub sql: Option<String>,
    pub error: String,
}

impl Attempt {
    pub fn failed(sql: Option<String>, error: impl Into<String>) -> Self {
        Self {
            sql,
            error: error.into(),
        }
    }
}

/// Ordered log of failed attempts; append-only, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Memory {
    attempts: Vec<Attempt>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter()
    }
}

impl From<Vec<Attempt>> for Memory {
    fn from(attempts: Vec<Attempt>) -> Self {
        Self { attempts }
    }
}

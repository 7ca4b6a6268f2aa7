//! Exemplar corpus loading
//!
//! A corpus is a directory tree of JSON documents, each holding a list of
//! `{"question": ..., "response": ...}` entries. Broken documents and entries
//! are logged and skipped; they never stop the load.

use super::Exemplar;
use crate::{Error, Result};
use serde_json::Value;
use std::path::Path;

/// Outcome counters of a corpus load
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CorpusReport {
    pub documents: usize,
    pub entries: usize,
    pub skipped_entries: usize,
    pub skipped_documents: usize,
}

impl std::fmt::Display for CorpusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} exemplars from {} documents ({} entries skipped, {} documents skipped)",
            self.entries, self.documents, self.skipped_entries, self.skipped_documents
        )
    }
}

/// Load every `**/*.json` document under `dir`.
///
/// A missing directory yields an empty corpus.
pub fn load_corpus(dir: &Path) -> Result<(Vec<Exemplar>, CorpusReport)> {
    let mut report = CorpusReport::default();
    let mut exemplars = Vec::new();

    if !dir.is_dir() {
        tracing::warn!("Exemplar directory {} not found, continuing without exemplars", dir.display());
        return Ok((exemplars, report));
    }

    let pattern = format!("{}/**/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let paths = glob::glob(&pattern).map_err(|e| Error::Ingest(format!("bad corpus pattern: {}", e)))?;

    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable corpus path: {}", e);
                report.skipped_documents += 1;
                continue;
            }
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.skipped_documents += 1;
                continue;
            }
        };
        match parse_document(&contents) {
            Ok(parsed) => {
                report.documents += 1;
                for item in parsed {
                    match item {
                        Ok(exemplar) => {
                            exemplars.push(exemplar);
                            report.entries += 1;
                        }
                        Err(e) => {
                            tracing::warn!("{}: {}", path.display(), e);
                            report.skipped_entries += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.skipped_documents += 1;
            }
        }
    }

    tracing::info!("Loaded {}", report);
    Ok((exemplars, report))
}

/// Parse one document into per-entry results.
pub fn parse_document(contents: &str) -> Result<Vec<Result<Exemplar>>> {
    let value: Value = serde_json::from_str(contents)
        .map_err(|e| Error::Ingest(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items.iter().map(parse_entry).collect()),
        other => Err(Error::Ingest(format!(
            "expected a list of entries, found {}",
            json_kind(&other)
        ))),
    }
}

/// Turn one corpus entry into an exemplar; both fields must be strings.
pub fn parse_entry(entry: &Value) -> Result<Exemplar> {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Ingest(format!("entry is missing `{}`", name)))
    };

    Ok(Exemplar::new(field("question")?, field("response")?))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

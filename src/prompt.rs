//! Prompt composition
//!
//! The prompt is rebuilt from scratch for every attempt; it is a pure
//! function of the schema, the question, the exemplar and the memory.

use crate::controller::Memory;
use crate::database::SchemaInfo;
use crate::exemplar::Exemplar;
use crate::{Error, Result};
use std::fmt::Write;

pub const EXAMPLE_HEADER: &str = "### Retrieved example";
pub const MEMORY_HEADER: &str = "### Previous attempts";

const RULES: &str = r#"Output one complete SQL query and nothing else: no explanation, no commentary. Follow these rules.

### 1. SQL syntax

- Aggregate functions must use call syntax with parentheses.
  - Correct: `SELECT MIN(日期) FROM "table_name"`
  - Wrong: `SELECT MIN 日期 FROM "table_name"`
- Table names are wrapped in double quotes; column names are written bare.
  - Correct: `SELECT 名稱 FROM "table_name"`
  - Wrong: `SELECT "名稱" FROM "table_name"`

### 2. GROUP BY

- When the question asks for the highest, lowest, average or sum (最高, 最低, 平均, 總和), you must use `GROUP BY`.
- When the question asks about each object, category or item (每個對象, 每個類別, 每個項目), you must use `GROUP BY`.
  - Wrong: `SELECT AVG(數值) FROM "table_name"`
  - Correct: `SELECT 類別, AVG(數值) FROM "table_name" GROUP BY 類別`
- Group by the attribute the question is about:
  - a question about an item ("which item has the highest value?") -> `GROUP BY 項目名稱`
  - a question about a category ("which category has the highest average?") -> `GROUP BY 類別名稱`
  - if the question does not say, default to `GROUP BY 項目名稱`
- Every `GROUP BY` column must also appear in the `SELECT` list.
  - Wrong: `SELECT MAX(數值) FROM "table_name" GROUP BY 類別`
  - Correct: `SELECT 類別, MAX(數值) FROM "table_name" GROUP BY 類別`
"#;

/// Fixed composition parameters taken from the configuration
#[derive(Debug, Clone, Copy)]
pub struct PromptOptions {
    /// Row-limit hint
    pub top_k: usize,
    /// Per-attempt cap on rendered error text
    pub memory_error_chars: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            top_k: crate::config::DEFAULT_TOP_K,
            memory_error_chars: crate::config::DEFAULT_MEMORY_ERROR_CHARS,
        }
    }
}

/// Compose the generation prompt for one attempt.
pub fn compose(
    schema: &SchemaInfo,
    question: &str,
    exemplar: Option<&Exemplar>,
    memory: &Memory,
    options: &PromptOptions,
) -> Result<String> {
    let schema_text = schema.render();
    if schema_text.trim().is_empty() {
        return Err(Error::Composition("no schema information available".to_string()));
    }

    let mut prompt = String::new();
    prompt.push_str("You are a SQL generator. Write one SQL query based on the information below.\n\n");
    let _ = writeln!(prompt, "- Table definitions:\n{}\n", schema_text.trim_end());
    let _ = writeln!(prompt, "- User question: {}", question);
    let _ = writeln!(prompt, "- Rows to fetch at most: {}\n", options.top_k);
    prompt.push_str(RULES);

    if let Some(exemplar) = exemplar {
        let _ = write!(
            prompt,
            "\n{}\n\nThe most similar stored question and its answer:\n\nQuestion: `{}`\nAnswer: `{}`\n",
            EXAMPLE_HEADER, exemplar.question, exemplar.answer
        );
    }

    if !memory.is_empty() {
        let _ = write!(
            prompt,
            "\n{}\n\nAttempts so far in this conversation and the errors they raised, oldest first. Do not repeat them:\n",
            MEMORY_HEADER
        );
        for (i, attempt) in memory.iter().enumerate() {
            let _ = write!(
                prompt,
                "\n{}. SQL: {}\n   Error: `{}`\n",
                i + 1,
                attempt.sql.as_deref().unwrap_or("(none)"),
                truncate_chars(&attempt.error, options.memory_error_chars)
            );
        }
    }

    Ok(prompt)
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

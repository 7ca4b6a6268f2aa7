//! Execution Adapter - the target database behind a small trait
//!
//! The database is described once at startup ([`SchemaInfo`]) and then asked
//! to run one generated statement per attempt ([`RawResult`]).

pub mod sqlite;

pub use sqlite::SqliteDatabase;

use crate::Result;
use serde::Serialize;
use std::fmt::Write;

/// The live database as seen by the retry loop
pub trait Database: Send + Sync {
    /// Describe every user table: definition plus a few sample rows
    fn describe_schema(&self) -> Result<SchemaInfo>;

    /// Execute one statement. Rejections surface as `Error::Execution`.
    fn run(&self, sql: &str) -> Result<RawResult>;
}

/// One table of the schema description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    /// `CREATE` statement as stored by the engine
    pub ddl: String,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Vec<String>>,
}

/// Serialized description of the connected database's tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    pub tables: Vec<TableInfo>,
}

impl SchemaInfo {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Text form embedded in prompts
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "\n{}\n", table.ddl.trim());
            if table.sample_rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "/*\n{} rows from {} table:", table.sample_rows.len(), table.name);
            let _ = writeln!(out, "{}", table.columns.join("\t"));
            for row in &table.sample_rows {
                let _ = writeln!(out, "{}", row.join("\t"));
            }
            out.push_str("*/\n");
        }
        out
    }
}

/// An engine value before normalization.
///
/// `Decimal`, `Date` and `Timestamp` carry the engine's literal text for
/// columns declared with those types.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Decimal(String),
    Date(String),
    Timestamp(String),
}

/// Column names plus rows, exactly as the engine returned them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_samples() {
        let schema = SchemaInfo {
            tables: vec![TableInfo {
                name: "sales".into(),
                ddl: "CREATE TABLE sales (item TEXT, amount REAL)".into(),
                columns: vec!["item".into(), "amount".into()],
                sample_rows: vec![vec!["tea".into(), "3.5".into()]],
            }],
        };

        let text = schema.render();
        assert!(text.contains("CREATE TABLE sales (item TEXT, amount REAL)"));
        assert!(text.contains("1 rows from sales table:"));
        assert!(text.contains("item\tamount\ntea\t3.5\n*/"));
    }

    #[test]
    fn test_render_empty() {
        assert!(SchemaInfo::default().render().is_empty());
    }
}

//! SQLite implementation of the execution adapter

use super::{Database, RawResult, RawValue, SchemaInfo, TableInfo};
use crate::{Error, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SAMPLE_CELL_CHARS: usize = 100;

/// Where a `DB_URL` points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite://rel/path.db`, `sqlite:///abs/path.db`,
    /// `sqlite::memory:` and bare file paths.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url == "sqlite::memory:" || url == "sqlite://:memory:" || url == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        if let Some(rest) = url.strip_prefix("sqlite://") {
            if rest.is_empty() {
                return Err(Error::Config("DB_URL has no database path".to_string()));
            }
            return Ok(DatabaseLocation::File(PathBuf::from(rest)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(Error::Config(format!(
                "unsupported database scheme `{}` (only sqlite is supported)",
                scheme
            )));
        }
        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }
}

/// SQLite-backed target database
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
    sample_rows: usize,
}

impl SqliteDatabase {
    /// Connect using a `DB_URL`. The database file must already exist.
    pub fn connect(url: &str, sample_rows: usize) -> Result<Self> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::Memory => Ok(Self::from_connection(Connection::open_in_memory()?, sample_rows)),
            DatabaseLocation::File(path) => Self::open(&path, sample_rows),
        }
    }

    /// Open an existing database file
    pub fn open(path: &Path, sample_rows: usize) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Config(format!("cannot open database {}: {}", path.display(), e)))?;
        tracing::info!("Connected to {}", path.display());
        Ok(Self::from_connection(conn, sample_rows))
    }

    pub fn from_connection(conn: Connection, sample_rows: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            sample_rows,
        }
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?, crate::config::DEFAULT_SAMPLE_ROWS))
    }

    /// Run a batch of statements directly (fixtures and setup)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Execution {
            message: "database connection is unavailable (lock poisoned)".to_string(),
        })
    }

    fn describe_table(&self, conn: &Connection, name: &str, ddl: String) -> Result<TableInfo> {
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} LIMIT {}",
            quote_identifier(name),
            self.sample_rows
        ))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut sample_rows = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(sample_text(row.get_ref(i)?));
            }
            sample_rows.push(cells);
        }

        Ok(TableInfo {
            name: name.to_string(),
            ddl,
            columns,
            sample_rows,
        })
    }
}

impl Database for SqliteDatabase {
    fn describe_schema(&self) -> Result<SchemaInfo> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name, sql FROM sqlite_master
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
             ORDER BY name",
        )?;
        let listed: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut tables = Vec::with_capacity(listed.len());
        for (name, ddl) in listed {
            tables.push(self.describe_table(&conn, &name, ddl)?);
        }

        tracing::debug!("Described {} tables", tables.len());
        Ok(SchemaInfo { tables })
    }

    fn run(&self, sql: &str) -> Result<RawResult> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(execution_error)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let kinds: Vec<DeclaredKind> = stmt
            .columns()
            .iter()
            .map(|c| DeclaredKind::from_decl(c.decl_type()))
            .collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([]).map_err(execution_error)?;
        while let Some(row) = rows.next().map_err(execution_error)? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, kind) in kinds.iter().enumerate() {
                let value = row.get_ref(i).map_err(execution_error)?;
                values.push(kind.apply(value));
            }
            out.push(values);
        }

        tracing::debug!("Query returned {} rows x {} columns", out.len(), columns.len());
        Ok(RawResult::new(columns, out))
    }
}

fn execution_error(e: rusqlite::Error) -> Error {
    Error::Execution { message: e.to_string() }
}

/// Literal family implied by a column's declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Plain,
    Decimal,
    Date,
    Timestamp,
}

impl DeclaredKind {
    fn from_decl(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return DeclaredKind::Plain;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.contains("DECIMAL") || decl.contains("NUMERIC") {
            DeclaredKind::Decimal
        } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
            DeclaredKind::Timestamp
        } else if decl.starts_with("DATE") {
            DeclaredKind::Date
        } else {
            DeclaredKind::Plain
        }
    }

    fn apply(self, value: ValueRef<'_>) -> RawValue {
        match (self, value) {
            (_, ValueRef::Null) => RawValue::Null,
            (DeclaredKind::Decimal, ValueRef::Integer(i)) => RawValue::Decimal(i.to_string()),
            (DeclaredKind::Decimal, ValueRef::Real(f)) => RawValue::Decimal(f.to_string()),
            (DeclaredKind::Decimal, ValueRef::Text(t)) => RawValue::Decimal(text(t)),
            (DeclaredKind::Date, ValueRef::Text(t)) => RawValue::Date(text(t)),
            (DeclaredKind::Timestamp, ValueRef::Text(t)) => RawValue::Timestamp(text(t)),
            (_, ValueRef::Integer(i)) => RawValue::Integer(i),
            (_, ValueRef::Real(f)) => RawValue::Real(f),
            (_, ValueRef::Text(t)) => RawValue::Text(text(t)),
            (_, ValueRef::Blob(b)) => RawValue::Blob(b.to_vec()),
        }
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn sample_text(value: ValueRef<'_>) -> String {
    let s = match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => text(t),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    };
    crate::prompt::truncate_chars(&s, SAMPLE_CELL_CHARS)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

//! SQLite query executor.
//!
//! Runs translated SQL against the same database that holds the user
//! records, on its own connection (WAL mode keeps readers and the store's
//! writer out of each other's way). Restricted to SELECT statements — the
//! translator's output is untrusted text, and this service only answers
//! questions.

use crate::error::{Error, Result};
use crate::query::{QueryExecutor, Row};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use std::path::Path;

/// Executor over a dedicated read connection.
pub struct SqliteExecutor {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteExecutor {
    /// Open a read connection to the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>> {
        let trimmed = query.trim();
        let is_select = trimmed
            .split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("select"));
        if !is_select {
            return Err(Error::Execution(
                "only SELECT statements are executed".into(),
            ));
        }

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(trimmed)
            .map_err(|e| Error::Execution(e.to_string()))?;
        let columns = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Row::with_capacity(columns);
                for idx in 0..columns {
                    values.push(to_json(row.get_ref(idx)?));
                }
                Ok(values)
            })
            .map_err(|e| Error::Execution(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Execution(e.to_string()))?;

        Ok(rows)
    }
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => i.into(),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned().into(),
        ValueRef::Blob(blob) => hex::encode(blob).into(),
    }
}

//! The query layer: natural language in, rows out.
//!
//! The trust core treats both halves as opaque collaborators behind traits:
//! the translator maps English to a SQL string (its output is passed through
//! unvalidated by the core), and the executor runs that string against the
//! database. A translator or executor failure is surfaced to the caller
//! unmodified — it is not retried, and it never moves karma (a malformed
//! question is not a role violation).

pub mod executor;
pub mod translator;

pub use executor::SqliteExecutor;
pub use translator::LlmTranslator;

use crate::error::Result;
use async_trait::async_trait;

/// One result row, column values in select order.
pub type Row = Vec<serde_json::Value>;

/// Maps a natural-language question to a SQL query string.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Executes a SQL query string and returns the result rows.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &str) -> Result<Vec<Row>>;
}

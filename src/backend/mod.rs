//! Relational backend abstraction
//!
//! The mapping layer never talks to a database driver directly. Everything it needs from a
//! relational store is the ability to run one typed, parameterized [`Statement`] and get
//! rows back. Two executors ship with the crate:
//!
//! - [`memory::MemoryExecutor`]: an in-process store that interprets statements directly,
//!   used by the CLI `plan` command and by the test suites
//! - `postgres::PostgresExecutor`: an `sqlx` pool (feature `postgres`)

use async_trait::async_trait;
use thiserror::Error;

use crate::sql_generator::{SqlValue, Statement};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryExecutor;
#[cfg(feature = "postgres")]
pub use postgres::PostgresExecutor;

/// Errors raised while executing a statement against a backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("Query failed: {message}\n  SQL: {sql}")]
    Query { sql: String, message: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Relation `{0}` does not exist")]
    UnknownTable(String),

    #[error("Column `{column}` does not exist in relation `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("Column `{column}` already exists in relation `{table}`")]
    DuplicateColumn { table: String, column: String },

    #[error("Duplicate key value violates constraint on `{table}` ({columns})")]
    ConstraintViolation { table: String, columns: String },

    #[error("Cannot convert value for column `{column}`: {message}")]
    Conversion { column: String, message: String },
}

/// One result row, addressed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Iterate `(column, value)` pairs in select order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Outcome of a single statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Rows inserted, updated or deleted (zero for SELECT and DDL)
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            rows_affected: 0,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }
}

/// Capability to run parameterized statements against a relational store.
///
/// Implementations must be safe to call concurrently: the write coordinator fans out
/// sibling sub-operations and awaits them together.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<QueryResult, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_by_name() {
        let row = Row::new(
            vec!["id".to_string(), "color".to_string()],
            vec![SqlValue::Integer(7), SqlValue::Text("black".to_string())],
        );
        assert_eq!(row.get("color"), Some(&SqlValue::Text("black".to_string())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
        assert_eq!(
            row.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            vec!["id", "color"]
        );
    }
}

//! Backend connection capability.
//!
//! The wire protocol to the relational backend is not part of this crate.
//! Anything that can run a statement and return text rows can be pooled by
//! implementing [`Connection`].

use crate::error::{BackendError, DbError};
use crate::escape::is_true;

/// A live connection to the backend.
///
/// Connections are created once at startup and pooled for the lifetime of
/// the process. They are used by one thread at a time.
pub trait Connection: Send + 'static {
    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64, BackendError>;

    /// Execute a query, returning its rows in text form.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, BackendError>;

    /// Check if the connection still looks usable.
    fn is_valid(&self) -> bool {
        true
    }
}

/// A result row in the backend's text representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row from column names and values. `None` is SQL NULL.
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Column names, in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of values in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `idx`; `None` for NULL or out of range.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx)?.as_deref()
    }

    /// Value of the named column.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.get(idx)
    }

    /// Check if the value at `idx` is NULL (or missing).
    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        self.get(idx).is_none()
    }

    /// Decode a boolean column from its text form.
    #[must_use]
    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        self.get(idx).map(is_true)
    }
}

/// Run a statement and log the outcome.
pub(crate) fn execute_on<C: Connection + ?Sized>(conn: &mut C, sql: &str) -> Result<u64, DbError> {
    match conn.execute(sql) {
        Ok(affected) => {
            tracing::debug!(statement = sql, affected, "statement succeeded");
            Ok(affected)
        }
        Err(e) => {
            tracing::error!(statement = sql, error = %e, code = ?e.code, "statement failed");
            Err(DbError::query(sql, e))
        }
    }
}

/// Run a query and log the outcome.
pub(crate) fn query_on<C: Connection + ?Sized>(conn: &mut C, sql: &str) -> Result<Vec<Row>, DbError> {
    match conn.query(sql) {
        Ok(rows) => {
            tracing::debug!(statement = sql, rows = rows.len(), "query succeeded");
            Ok(rows)
        }
        Err(e) => {
            tracing::error!(statement = sql, error = %e, code = ?e.code, "query failed");
            Err(DbError::query(sql, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".into(), "title".into(), "published".into()],
            vec![Some("7".into()), None, Some("t".into())],
        )
    }

    #[test]
    fn test_row_access() {
        let row = sample();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some("7"));
        assert_eq!(row.get_by_name("id"), Some("7"));
        assert!(row.is_null(1));
        assert!(row.is_null(9));
        assert_eq!(row.get_by_name("missing"), None);
    }

    #[test]
    fn test_row_bool_decoding() {
        let row = sample();
        assert_eq!(row.get_bool(2), Some(true));
        assert_eq!(row.get_bool(0), Some(false));
        assert_eq!(row.get_bool(1), None);
    }
}

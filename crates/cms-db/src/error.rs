//! Database layer error types.

use std::time::Duration;

use cms_pool::PoolError;
use thiserror::Error;

/// Error reported by a backend [`Connection`](crate::Connection).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Backend error text.
    pub message: String,
    /// Backend error code (SQLSTATE or similar), if the backend supplied one.
    pub code: Option<String>,
}

impl BackendError {
    /// Create a backend error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a backend error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Errors that can occur in connection manager operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DbError {
    /// Pool-level failure.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// No pooled connection was released before the acquire timeout.
    #[error("no database connection available after {0:?}")]
    ConnectionUnavailable(Duration),

    /// The backend rejected a statement.
    #[error("query failed: {message} (statement: {statement})")]
    Query {
        /// Statement text that failed.
        statement: String,
        /// Backend error text.
        message: String,
    },

    /// A schema identifier was used without being registered.
    #[error("unknown schema identifier: {0}")]
    UnknownIdentifier(String),

    /// Number of `?` placeholders does not match the number of arguments.
    #[error("template has {placeholders} placeholders but {arguments} arguments were given")]
    PlaceholderMismatch {
        /// Placeholders found in the template.
        placeholders: usize,
        /// Arguments supplied.
        arguments: usize,
    },

    /// Invalid physical identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl DbError {
    /// Build a [`DbError::Query`] from a failed statement.
    pub fn query(statement: impl Into<String>, err: BackendError) -> Self {
        Self::Query {
            statement: statement.into(),
            message: err.message,
        }
    }

    /// Build an unknown-identifier error for any schema key.
    pub fn unknown(id: &impl std::fmt::Debug) -> Self {
        Self::UnknownIdentifier(format!("{id:?}"))
    }

    /// Check if this error is transient and may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(e) => e.is_transient(),
            Self::ConnectionUnavailable(_) => true,
            _ => false,
        }
    }

    /// Check if this error points at application setup rather than the
    /// database.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownIdentifier(_)
                | Self::PlaceholderMismatch { .. }
                | Self::InvalidIdentifier(_)
                | Self::Config(_)
                | Self::Pool(PoolError::Configuration(_))
        )
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_carries_statement() {
        let err = DbError::query(
            "DROP TABLE \"x\";",
            BackendError::new("permission denied").with_code("42501"),
        );
        let msg = err.to_string();
        assert!(msg.contains("permission denied"));
        assert!(msg.contains("DROP TABLE \"x\";"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classification() {
        assert!(DbError::ConnectionUnavailable(Duration::from_secs(1)).is_transient());
        assert!(DbError::Pool(PoolError::Exhausted).is_transient());
        assert!(!DbError::Pool(PoolError::Closed).is_transient());

        assert!(DbError::unknown(&"ROOT").is_configuration_error());
        assert!(
            DbError::PlaceholderMismatch {
                placeholders: 2,
                arguments: 1
            }
            .is_configuration_error()
        );
        assert!(!DbError::Transaction("begin failed".into()).is_configuration_error());
    }

    #[test]
    fn test_unknown_identifier_uses_debug_form() {
        assert_eq!(
            DbError::unknown(&"ROOT").to_string(),
            "unknown schema identifier: \"ROOT\""
        );
    }
}

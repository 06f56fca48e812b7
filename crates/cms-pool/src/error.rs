//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The factory failed to create a resource while the pool was being filled.
    ///
    /// Not fatal: the pool simply starts with fewer resources.
    #[error("failed to create pooled resource: {0}")]
    ResourceCreation(String),

    /// No resource is available right now.
    #[error("pool exhausted")]
    Exhausted,

    /// No resource became available before the deadline.
    #[error("no resource became available within {0:?}")]
    Timeout(Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    Closed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Check if this error may clear up if the caller tries again later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PoolError::Exhausted.is_transient());
        assert!(PoolError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(!PoolError::Closed.is_transient());
        assert!(!PoolError::ResourceCreation("refused".into()).is_transient());
    }

    #[test]
    fn test_timeout_message_includes_duration() {
        let msg = PoolError::Timeout(Duration::from_millis(250)).to_string();
        assert!(msg.contains("250ms"));
    }
}

//! Application context handed to request handlers.

use std::sync::Arc;

use crate::connection::Connection;
use crate::manager::ConnectionManager;
use crate::schema::SchemaKey;

/// Process-wide services, constructed once at startup.
///
/// Cloning is cheap; every clone shares the same connection manager.
/// Request handlers receive a context instead of reaching for a global.
pub struct AppContext<C: Connection, K: SchemaKey = &'static str> {
    db: Arc<ConnectionManager<C, K>>,
}

impl<C: Connection, K: SchemaKey> AppContext<C, K> {
    /// Wrap a connection manager.
    #[must_use]
    pub fn new(db: ConnectionManager<C, K>) -> Self {
        Self { db: Arc::new(db) }
    }

    /// The shared connection manager.
    #[must_use]
    pub fn db(&self) -> &ConnectionManager<C, K> {
        &self.db
    }
}

impl<C: Connection, K: SchemaKey> Clone for AppContext<C, K> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

//! In-memory mock backend.
//!
//! [`MockDatabase`] is the shared "server"; [`MockConnection`] is one
//! client session against it. Clones of a `MockDatabase` observe the same
//! state, so a test keeps one handle for assertions and moves another into
//! the connector closure.
//!
//! Transactions are approximated with a catalog snapshot taken at `BEGIN`
//! and restored at `ROLLBACK`. Concurrent sessions are not isolated from
//! each other.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use cms_db::{BackendError, Connection, ConnectionConfig, Row, statement};
use parking_lot::Mutex;

use crate::sql::{self, Catalog, Outcome};

/// SQLSTATE used for injected statement failures.
pub const INJECTED_FAILURE_CODE: &str = "XX000";

#[derive(Debug, Default)]
struct State {
    catalog: Catalog,
    statements: Vec<String>,
    failures: Vec<String>,
    refuse_connects: usize,
    next_id: u64,
    open: usize,
    broken: HashSet<u64>,
    latency: Option<Duration>,
    last_connection_string: Option<String>,
}

/// Shared state of the mock backend.
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<State>>,
}

impl MockDatabase {
    /// Create an empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session. Usable directly as the connector passed to
    /// `ConnectionManager::connect`.
    pub fn connect(&self, params: &ConnectionConfig) -> Result<MockConnection, BackendError> {
        let mut state = self.state.lock();
        state.last_connection_string = Some(params.to_connection_string());

        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            tracing::debug!(target_db = %params, "mock refusing connection");
            return Err(BackendError::new("connection refused").with_code("08001"));
        }

        state.next_id += 1;
        state.open += 1;
        let id = state.next_id;
        tracing::trace!(id, "mock connection opened");

        Ok(MockConnection {
            id,
            db: self.clone(),
            snapshot: None,
        })
    }

    /// Fail every statement containing `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state.lock().failures.push(fragment.into());
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next_connections(&self, count: usize) {
        self.state.lock().refuse_connects = count;
    }

    /// Mark the session `id` as dead: it reports itself invalid and every
    /// statement on it fails.
    pub fn break_connection(&self, id: u64) {
        self.state.lock().broken.insert(id);
    }

    /// Delay every statement by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    /// Every statement received so far, in order, including failed ones.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget the statement log.
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Number of received statements containing `fragment`.
    #[must_use]
    pub fn executed(&self, fragment: &str) -> usize {
        self.state
            .lock()
            .statements
            .iter()
            .filter(|s| s.contains(fragment))
            .count()
    }

    /// Check if the backend has a table called `name`.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.state.lock().catalog.tables.contains_key(name)
    }

    /// Check if the backend has an enum type called `name`.
    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.state.lock().catalog.types.contains_key(name)
    }

    /// Labels of the enum type `name`.
    #[must_use]
    pub fn enum_values(&self, name: &str) -> Option<Vec<String>> {
        self.state.lock().catalog.types.get(name).cloned()
    }

    /// Rows stored in table `name`; empty if the table does not exist.
    #[must_use]
    pub fn rows(&self, name: &str) -> Vec<BTreeMap<String, String>> {
        self.state
            .lock()
            .catalog
            .tables
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Sessions opened and not yet dropped.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.lock().open
    }

    /// Connection string of the most recent connection attempt.
    #[must_use]
    pub fn last_connection_string(&self) -> Option<String> {
        self.state.lock().last_connection_string.clone()
    }
}

/// One session against a [`MockDatabase`].
#[derive(Debug)]
pub struct MockConnection {
    id: u64,
    db: MockDatabase,
    snapshot: Option<Catalog>,
}

impl MockConnection {
    /// Session id, unique per `MockDatabase`. Starts at 1.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn run(&mut self, sql: &str) -> Result<Outcome, BackendError> {
        let latency = self.db.state.lock().latency;
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let mut state = self.db.state.lock();
        state.statements.push(sql.to_string());

        if state.broken.contains(&self.id) {
            return Err(
                BackendError::new("server closed the connection unexpectedly").with_code("08006"),
            );
        }
        if state.failures.iter().any(|f| sql.contains(f.as_str())) {
            tracing::debug!(id = self.id, sql, "mock injecting failure");
            return Err(BackendError::new("injected failure").with_code(INJECTED_FAILURE_CODE));
        }

        match sql.trim() {
            statement::BEGIN => {
                self.snapshot = Some(state.catalog.clone());
                Ok(Outcome::Affected(0))
            }
            statement::COMMIT => {
                self.snapshot = None;
                Ok(Outcome::Affected(0))
            }
            statement::ROLLBACK => {
                if let Some(snapshot) = self.snapshot.take() {
                    state.catalog = snapshot;
                }
                Ok(Outcome::Affected(0))
            }
            _ => sql::apply(&mut state.catalog, sql),
        }
    }
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, BackendError> {
        match self.run(sql)? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(rows) => Ok(rows.len() as u64),
        }
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, BackendError> {
        match self.run(sql)? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Ok(Vec::new()),
        }
    }

    fn is_valid(&self) -> bool {
        !self.db.state.lock().broken.contains(&self.id)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.db.state.lock();
        state.open = state.open.saturating_sub(1);
        tracing::trace!(id = self.id, "mock connection closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params() -> ConnectionConfig {
        ConnectionConfig::new().host("mock").dbname("cms_test")
    }

    #[test]
    fn test_connect_and_drop_tracks_open_sessions() {
        let db = MockDatabase::new();
        let a = db.connect(&params()).unwrap();
        let b = db.connect(&params()).unwrap();
        assert_eq!((a.id(), b.id()), (1, 2));
        assert_eq!(db.open_connections(), 2);

        drop(a);
        assert_eq!(db.open_connections(), 1);
        assert!(db.last_connection_string().unwrap().contains("dbname=cms_test"));
    }

    #[test]
    fn test_refused_connections() {
        let db = MockDatabase::new();
        db.refuse_next_connections(1);
        assert!(db.connect(&params()).is_err());
        assert!(db.connect(&params()).is_ok());
    }

    #[test]
    fn test_injected_failure_is_logged() {
        let db = MockDatabase::new();
        let mut conn = db.connect(&params()).unwrap();
        db.fail_on("DROP");

        let err = conn.execute("DROP TABLE IF EXISTS \"x\";").unwrap_err();
        assert_eq!(err.code.as_deref(), Some(INJECTED_FAILURE_CODE));
        assert_eq!(db.executed("DROP TABLE"), 1);

        db.clear_failures();
        assert!(conn.execute("DROP TABLE IF EXISTS \"x\";").is_ok());
    }

    #[test]
    fn test_broken_connection() {
        let db = MockDatabase::new();
        let mut conn = db.connect(&params()).unwrap();
        assert!(conn.is_valid());

        db.break_connection(conn.id());
        assert!(!conn.is_valid());
        assert!(conn.execute("SELECT 1;").is_err());
    }

    #[test]
    fn test_rollback_restores_catalog() {
        let db = MockDatabase::new();
        let mut conn = db.connect(&params()).unwrap();

        conn.execute(statement::BEGIN).unwrap();
        conn.execute(&statement::create_table("pages", "id INT")).unwrap();
        assert!(db.has_table("pages"));
        conn.execute(statement::ROLLBACK).unwrap();
        assert!(!db.has_table("pages"));

        conn.execute(statement::BEGIN).unwrap();
        conn.execute(&statement::create_table("pages", "id INT")).unwrap();
        conn.execute(statement::COMMIT).unwrap();
        assert!(db.has_table("pages"));
    }
}

//! Transaction guard over a leased connection.

use crate::connection::{Connection, Row, execute_on, query_on};
use crate::error::{DbError, Result};
use crate::statement::{BEGIN, COMMIT, ROLLBACK};

/// An open transaction on a borrowed connection.
///
/// Dropping the guard without calling [`commit`](Self::commit) rolls the
/// transaction back, so an early return or `?` never leaves a pooled
/// connection inside an open transaction.
///
/// ```rust,ignore
/// let mut conn = manager.connection()?;
/// let mut tx = Transaction::begin(&mut *conn)?;
/// tx.execute(&statement::delete("pages", "id", "7"))?;
/// tx.commit()?;
/// ```
pub struct Transaction<'c, C: Connection> {
    conn: &'c mut C,
    finished: bool,
}

impl<'c, C: Connection> Transaction<'c, C> {
    /// Open a transaction on `conn`.
    pub fn begin(conn: &'c mut C) -> Result<Self> {
        execute_on(&mut *conn, BEGIN)
            .map_err(|e| DbError::Transaction(format!("begin failed: {e}")))?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Execute a statement inside the transaction.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        execute_on(&mut *self.conn, sql)
    }

    /// Run a query inside the transaction.
    pub fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        query_on(&mut *self.conn, sql)
    }

    /// Commit the transaction.
    ///
    /// If the commit itself fails the backend has already discarded the
    /// transaction; a rollback is still issued to leave the connection clean.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        match execute_on(&mut *self.conn, COMMIT) {
            Ok(_) => Ok(()),
            Err(e) => {
                let _ = execute_on(&mut *self.conn, ROLLBACK);
                Err(DbError::Transaction(format!("commit failed: {e}")))
            }
        }
    }

    /// Roll the transaction back.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        execute_on(&mut *self.conn, ROLLBACK)
            .map(|_| ())
            .map_err(|e| DbError::Transaction(format!("rollback failed: {e}")))
    }
}

impl<C: Connection> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("transaction dropped without commit, rolling back");
            // Failure is already logged by execute_on.
            let _ = execute_on(&mut *self.conn, ROLLBACK);
        }
    }
}

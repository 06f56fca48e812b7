//! Connection manager: pooled connections plus schema-aware DDL and CRUD.
//!
//! The manager is built once at startup. It opens `capacity` connections,
//! keeps them in a [`ResourcePool`], and resolves schema identifiers through
//! its [`SchemaRegistry`] whenever a statement needs a physical name.
//!
//! Every operation reports failure through [`DbError`]; a backend error is
//! logged together with the statement that caused it.

use std::collections::HashSet;
use std::time::Instant;

use cms_pool::{Lease, PoolError, PoolStatus, ResourcePool};
use parking_lot::Mutex;

use crate::config::{ConnectionConfig, DatabaseSettings};
use crate::connection::{Connection, Row, execute_on, query_on};
use crate::error::{BackendError, DbError, Result};
use crate::escape::validate_identifier;
use crate::schema::{EnumDef, SchemaKey, SchemaRegistry, TableDef};
use crate::statement;
use crate::transaction::Transaction;

/// Lifecycle of a schema identifier as seen by one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Not in the registry.
    Unregistered,
    /// In the registry, DDL not yet applied through this manager.
    Registered,
    /// DDL applied.
    Materialized,
}

/// Outcome of [`ConnectionManager::initialize`].
///
/// Each identifier is materialized on its own, so one failure does not
/// stop or undo the others.
#[derive(Debug)]
pub struct InitReport<K> {
    /// Enum types that exist after initialization.
    pub enums: Vec<K>,
    /// Tables that exist after initialization.
    pub tables: Vec<K>,
    /// Identifiers that could not be materialized.
    pub failures: Vec<(K, DbError)>,
}

impl<K> InitReport<K> {
    /// Check if every registered identifier was materialized.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Materialized<K> {
    tables: HashSet<K>,
    enums: HashSet<K>,
}

/// Pooled connections and schema-aware helpers for one database.
pub struct ConnectionManager<C: Connection, K: SchemaKey = &'static str> {
    pool: ResourcePool<C>,
    schema: SchemaRegistry<K>,
    settings: DatabaseSettings,
    materialized: Mutex<Materialized<K>>,
    /// Serializes renames so the registry and the backend cannot diverge.
    rename_lock: Mutex<()>,
}

impl<C: Connection, K: SchemaKey> ConnectionManager<C, K> {
    /// Open `settings.pool.capacity` connections with `connector`.
    ///
    /// Connections that fail to open are logged and skipped; the manager
    /// starts with a smaller pool rather than failing. Only invalid settings
    /// are an error here.
    pub fn connect<F>(settings: DatabaseSettings, mut connector: F) -> Result<Self>
    where
        F: FnMut(&ConnectionConfig) -> std::result::Result<C, BackendError>,
    {
        settings.validate()?;
        tracing::info!(
            target_db = %settings.connection,
            capacity = settings.pool.capacity,
            "opening database connections"
        );

        let params = &settings.connection;
        let (pool, created) = ResourcePool::new(settings.pool.capacity, || connector(params));
        if created == 0 {
            tracing::error!("no database connection could be opened");
        }

        Ok(Self {
            pool,
            schema: SchemaRegistry::new(),
            settings,
            materialized: Mutex::new(Materialized {
                tables: HashSet::new(),
                enums: HashSet::new(),
            }),
            rename_lock: Mutex::new(()),
        })
    }

    /// The schema registry. Register tables and enums here before
    /// calling [`initialize`](Self::initialize).
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry<K> {
        &self.schema
    }

    /// Settings the manager was built with.
    #[must_use]
    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Lease a connection, waiting up to the configured acquire timeout.
    ///
    /// Connections that report themselves invalid are taken out of the pool
    /// for good and the wait continues. They are not replaced.
    pub fn connection(&self) -> Result<Lease<C>> {
        let timeout = self.settings.pool.acquire_timeout;
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let remaining = deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(timeout);

            let lease = self.pool.acquire_timeout(remaining).map_err(|e| match e {
                PoolError::Timeout(_) => {
                    tracing::error!(?timeout, "no database connection available");
                    DbError::ConnectionUnavailable(timeout)
                }
                other => DbError::Pool(other),
            })?;

            if lease.is_valid() {
                return Ok(lease);
            }

            tracing::warn!("discarding dead connection; pool capacity reduced until restart");
            drop(lease.detach());
        }
    }

    /// Execute a raw statement on a pooled connection.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        let mut conn = self.connection()?;
        execute_on(&mut *conn, sql)
    }

    /// Run a raw query on a pooled connection.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut conn = self.connection()?;
        query_on(&mut *conn, sql)
    }

    /// Run `f` inside a transaction on one pooled connection.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    pub fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_, C>) -> Result<R>,
    {
        let mut conn = self.connection()?;
        let mut tx = Transaction::begin(&mut *conn)?;

        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback after failed transaction body");
                }
                Err(e)
            }
        }
    }

    /// Materialize every registered enum, then every registered table.
    pub fn initialize(&self) -> InitReport<K> {
        let mut report = InitReport {
            enums: Vec::new(),
            tables: Vec::new(),
            failures: Vec::new(),
        };

        for id in self.schema.enums() {
            match self.create_enum(&id) {
                Ok(()) => report.enums.push(id),
                Err(e) => {
                    tracing::error!(?id, error = %e, "failed to materialize enum");
                    report.failures.push((id, e));
                }
            }
        }

        for id in self.schema.tables() {
            match self.create_table(&id) {
                Ok(()) => report.tables.push(id),
                Err(e) => {
                    tracing::error!(?id, error = %e, "failed to materialize table");
                    report.failures.push((id, e));
                }
            }
        }

        tracing::info!(
            enums = report.enums.len(),
            tables = report.tables.len(),
            failures = report.failures.len(),
            "schema initialized"
        );
        report
    }

    /// Create the enum type for `id` unless the backend already has it.
    pub fn create_enum(&self, id: &K) -> Result<()> {
        let def = self.enum_def(id)?;
        let mut conn = self.connection()?;

        let existing = query_on(&mut *conn, &statement::enum_exists(&def.name))?;
        if existing.is_empty() {
            execute_on(&mut *conn, &statement::create_enum(&def.name, &def.values))?;
        } else {
            tracing::debug!(?id, name = %def.name, "enum already exists");
        }

        self.materialized.lock().enums.insert(id.clone());
        Ok(())
    }

    /// Create the table for `id` if it does not exist.
    pub fn create_table(&self, id: &K) -> Result<()> {
        let def = self.table_def(id)?;
        self.execute(&statement::create_table(&def.name, &def.fields))?;
        self.materialized.lock().tables.insert(id.clone());
        Ok(())
    }

    /// Drop the table for `id` if it exists.
    pub fn drop_table(&self, id: &K) -> Result<()> {
        let def = self.table_def(id)?;
        self.execute(&statement::drop_table(&def.name))?;
        self.materialized.lock().tables.remove(id);
        Ok(())
    }

    /// Rename the backing table for `id` and record the new name.
    ///
    /// The registry is only updated once the backend accepted the rename.
    pub fn rename_table(&self, id: &K, new_name: &str) -> Result<()> {
        validate_identifier(new_name)?;
        let _guard = self.rename_lock.lock();

        let old = self.table_def(id)?.name;
        self.execute(&statement::rename_table(&old, new_name))?;
        self.schema.set_table_name(id, new_name);

        tracing::info!(?id, from = %old, to = new_name, "table renamed");
        Ok(())
    }

    /// Check the backend catalog for the table behind `id`.
    pub fn table_exists(&self, id: &K) -> Result<bool> {
        let def = self.table_def(id)?;
        Ok(!self.query(&statement::table_exists(&def.name))?.is_empty())
    }

    /// Insert one row into the table for `id`.
    pub fn insert<S, V>(&self, id: &K, columns: &[S], values: &[V]) -> Result<u64>
    where
        S: AsRef<str>,
        V: AsRef<str>,
    {
        let def = self.table_def(id)?;
        let sql = statement::insert(&def.name, columns, values).inspect_err(|e| {
            tracing::error!(?id, error = %e, "rejected insert");
        })?;
        self.execute(&sql)
    }

    /// Update rows of the table for `id` where `where_column = where_value`.
    ///
    /// `set_template` holds one `?` per entry of `args`, for example
    /// `"title" = ?, "modified" = ?`. Substitution is plain text: every `?`
    /// in the template counts, including one inside a quoted literal such
    /// as `'why?'`. Pass such values as arguments instead.
    pub fn update<S: AsRef<str>>(
        &self,
        id: &K,
        where_column: &str,
        where_value: &str,
        set_template: &str,
        args: &[S],
    ) -> Result<u64> {
        let def = self.table_def(id)?;
        let sql = statement::update(&def.name, where_column, where_value, set_template, args)
            .inspect_err(|e| {
                tracing::error!(?id, template = set_template, error = %e, "rejected update");
            })?;
        self.execute(&sql)
    }

    /// Delete rows of the table for `id` where `where_column = where_value`.
    pub fn delete(&self, id: &K, where_column: &str, where_value: &str) -> Result<u64> {
        let def = self.table_def(id)?;
        self.execute(&statement::delete(&def.name, where_column, where_value))
    }

    /// Where the table behind `id` is in its lifecycle.
    #[must_use]
    pub fn table_state(&self, id: &K) -> SchemaState {
        if self.materialized.lock().tables.contains(id) {
            SchemaState::Materialized
        } else if self.schema.table(id).is_some() {
            SchemaState::Registered
        } else {
            SchemaState::Unregistered
        }
    }

    /// Where the enum type behind `id` is in its lifecycle.
    #[must_use]
    pub fn enum_state(&self, id: &K) -> SchemaState {
        if self.materialized.lock().enums.contains(id) {
            SchemaState::Materialized
        } else if self.schema.enum_def(id).is_some() {
            SchemaState::Registered
        } else {
            SchemaState::Unregistered
        }
    }

    /// Close the pool. Leased connections are closed when returned.
    pub fn shutdown(&self) {
        tracing::info!(status = ?self.pool.status(), "shutting down connection manager");
        self.pool.close();
    }

    fn table_def(&self, id: &K) -> Result<TableDef> {
        self.schema.table(id).ok_or_else(|| {
            let err = DbError::unknown(id);
            tracing::error!(error = %err, "table is not registered");
            err
        })
    }

    fn enum_def(&self, id: &K) -> Result<EnumDef> {
        self.schema.enum_def(id).ok_or_else(|| {
            let err = DbError::unknown(id);
            tracing::error!(error = %err, "enum is not registered");
            err
        })
    }
}

impl<C: Connection, K: SchemaKey> std::fmt::Debug for ConnectionManager<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("pool", &self.pool.status())
            .field("schema", &self.schema)
            .field("settings", &self.settings)
            .finish()
    }
}

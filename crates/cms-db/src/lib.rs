//! # cms-db
//!
//! Database core of the CMS: a fixed pool of backend connections, a
//! registry of the tables and enum types the application uses, and helpers
//! that turn schema identifiers into DDL and CRUD statements.
//!
//! ## Features
//!
//! - Connections opened once at startup and leased per request
//! - Bounded wait for a free connection, never an indefinite hang
//! - Tables and enum types addressed by a stable key, renameable at runtime
//! - Idempotent schema materialization with per-identifier failure isolation
//! - Values always quoted as literals, identifiers always quoted as names
//!
//! ## Example
//!
//! ```rust,ignore
//! use cms_db::{AppContext, ConnectionManager, DatabaseSettings};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Table { Root }
//!
//! let manager = ConnectionManager::connect(DatabaseSettings::default(), |params| {
//!     my_backend::connect(&params.to_connection_string())
//! })?;
//! manager.schema().register_table(Table::Root, "cms_root", "id SERIAL PRIMARY KEY, title TEXT");
//! manager.initialize();
//!
//! let ctx = AppContext::new(manager);
//! ctx.db().insert(&Table::Root, &["title"], &["Home"])?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod escape;
pub mod manager;
pub mod schema;
pub mod statement;
pub mod transaction;

pub use cms_pool::{Lease, PoolConfig, PoolError, PoolStatus};
pub use config::{ConnectionConfig, DatabaseSettings};
pub use connection::{Connection, Row};
pub use context::AppContext;
pub use error::{BackendError, DbError, Result};
pub use escape::{escape, is_true, quote_identifier, quote_literal};
pub use manager::{ConnectionManager, InitReport, SchemaState};
pub use schema::{EnumDef, SchemaKey, SchemaRegistry, TableDef};
pub use transaction::Transaction;

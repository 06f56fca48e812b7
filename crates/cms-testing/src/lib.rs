//! # cms-testing
//!
//! Test infrastructure for the CMS database layer.
//!
//! ## Features
//!
//! - In-memory mock backend that understands the statements `cms-db` emits
//! - Failure injection by statement substring
//! - Refused connections and dead connections for pool degradation tests
//! - Statement log for asserting on generated SQL
//! - Fixtures for settings and tracing output
//!
//! ## Example
//!
//! ```rust,ignore
//! use cms_db::ConnectionManager;
//! use cms_testing::{MockDatabase, fixtures};
//!
//! let db = MockDatabase::new();
//! let manager = ConnectionManager::connect(fixtures::settings(2), |params| db.connect(params))?;
//! manager.schema().register_table("ROOT", "cms_root", "id INT");
//! manager.create_table(&"ROOT")?;
//! assert!(db.has_table("cms_root"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock;
mod sql;

pub use mock::{INJECTED_FAILURE_CODE, MockConnection, MockDatabase};

//! # cms-pool
//!
//! Fixed-capacity pool of pre-constructed, long-lived resources.
//!
//! The pool is filled once at construction and never grows. Resources are
//! handed out as [`Lease`]s; dropping a lease puts the resource back.
//!
//! ## Features
//!
//! - LIFO hand-out: the most recently returned resource is reused first
//! - Non-blocking [`ResourcePool::acquire`] and deadline-bounded
//!   [`ResourcePool::acquire_timeout`]
//! - Leases hold only a weak reference to the pool, so a lease may safely
//!   outlive the pool that produced it
//! - Explicit [`ResourcePool::close`] for orderly shutdown
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use cms_pool::{PoolError, ResourcePool};
//!
//! let mut next = 0;
//! let (pool, created) = ResourcePool::new(2, || {
//!     next += 1;
//!     Ok::<_, std::io::Error>(next)
//! });
//! assert_eq!(created, 2);
//!
//! let a = pool.acquire()?;
//! let _b = pool.acquire()?;
//! assert!(matches!(pool.acquire(), Err(PoolError::Exhausted)));
//!
//! drop(a);
//! let again = pool.acquire_timeout(Duration::from_millis(10))?;
//! assert_eq!(*again, 2);
//! # Ok::<(), PoolError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lease;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use lease::Lease;
pub use pool::{PoolStatus, ResourcePool};

//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Default number of pooled resources.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default time a caller waits for a resource before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`ResourcePool`](crate::ResourcePool).
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
///
/// With the `serde` feature enabled it can be read straight out of an
/// application config file; `acquire_timeout_ms` is given in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct PoolConfig {
    /// Number of resources created up front. The pool never holds more.
    pub capacity: usize,

    /// Time to wait for a released resource before timing out.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "acquire_timeout_ms", deserialize_with = "duration_ms::deserialize")
    )]
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool capacity.
    #[must_use]
    pub fn capacity(mut self, count: usize) -> Self {
        self.capacity = count;
        self
    }

    /// Set the acquisition timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::Configuration(
                "capacity must be greater than 0".into(),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "acquire_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

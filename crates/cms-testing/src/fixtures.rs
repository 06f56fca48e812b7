//! Test fixture utilities.

use std::time::Duration;

use cms_db::{ConnectionConfig, DatabaseSettings, PoolConfig};

/// Acquire timeout used by [`settings`]; short enough to keep exhaustion
/// tests fast.
pub const TEST_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(200);

/// Settings for a pool of `capacity` mock connections.
#[must_use]
pub fn settings(capacity: usize) -> DatabaseSettings {
    settings_with_timeout(capacity, TEST_ACQUIRE_TIMEOUT)
}

/// Settings for a pool of `capacity` mock connections with a custom
/// acquire timeout.
#[must_use]
pub fn settings_with_timeout(capacity: usize, timeout: Duration) -> DatabaseSettings {
    DatabaseSettings::new(
        ConnectionConfig::new()
            .host("mock")
            .dbname("cms_test")
            .user("cms")
            .application_name("cms-testing"),
        PoolConfig::new().capacity(capacity).acquire_timeout(timeout),
    )
}

/// Install a tracing subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
/// Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//! Connection and database settings.

use std::time::Duration;

use cms_pool::PoolConfig;
use serde::Deserialize;

use crate::error::{DbError, Result};

/// Default application name reported to the backend.
pub const DEFAULT_APPLICATION_NAME: &str = "cms";

/// Parameters for opening one backend connection.
///
/// Every parameter is optional. Absent or blank parameters are left out of
/// the connection string so the backend applies its own defaults.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ConnectionConfig {
    /// Server hostname, IP address or socket directory.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Database name.
    pub dbname: Option<String>,
    /// Login user.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Application name shown in backend activity views.
    pub application_name: Option<String>,
    /// Time allowed to establish a connection, in whole seconds.
    #[serde(rename = "connect_timeout_secs", deserialize_with = "secs::deserialize")]
    pub connect_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Set the login user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Set the connect timeout.
    ///
    /// libpq counts whole seconds and treats 0 as "wait forever", so the
    /// connection string rounds up and never sends less than 1.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build a libpq-style `key=value` connection string.
    ///
    /// ```text
    /// host=localhost port=5432 dbname=cms user=cms password='s3cr et'
    /// ```
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        self.pairs(true)
            .into_iter()
            .map(|(key, value)| format!("{key}={}", quote_value(&value)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a libpq-style `key=value` connection string.
    ///
    /// Values may be single-quoted; inside quotes `\'` and `\\` are escapes.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in tokenize(conn_str)? {
            match key.as_str() {
                "host" | "hostaddr" => config.host = Some(value),
                "port" => {
                    config.port = Some(
                        value
                            .parse()
                            .map_err(|_| DbError::Config(format!("invalid port: {value}")))?,
                    );
                }
                "dbname" => config.dbname = Some(value),
                "user" => config.user = Some(value),
                "password" => config.password = Some(value),
                "application_name" => config.application_name = Some(value),
                "connect_timeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        DbError::Config(format!("invalid connect_timeout: {value}"))
                    })?;
                    config.connect_timeout = Some(Duration::from_secs(secs));
                }
                other => {
                    return Err(DbError::Config(format!(
                        "unknown connection parameter: {other}"
                    )));
                }
            }
        }

        Ok(config)
    }

    /// Non-blank parameters in connection-string order.
    fn pairs(&self, include_password: bool) -> Vec<(&'static str, String)> {
        let password = if include_password {
            non_blank(&self.password)
        } else {
            None
        };

        [
            ("host", non_blank(&self.host)),
            ("port", self.port.map(|p| p.to_string())),
            ("dbname", non_blank(&self.dbname)),
            ("user", non_blank(&self.user)),
            ("password", password),
            ("application_name", non_blank(&self.application_name)),
            (
                "connect_timeout",
                self.connect_timeout.map(|t| whole_seconds(t).to_string()),
            ),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl std::fmt::Display for ConnectionConfig {
    /// Connection string with the password left out, for logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = self
            .pairs(false)
            .into_iter()
            .map(|(key, value)| format!("{key}={}", quote_value(&value)))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&shown)
    }
}

/// Everything the connection manager needs at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Parameters for each pooled connection.
    pub connection: ConnectionConfig,
    /// Pool sizing and acquisition timeout.
    pub pool: PoolConfig,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::new().application_name(DEFAULT_APPLICATION_NAME),
            pool: PoolConfig::default(),
        }
    }
}

impl DatabaseSettings {
    /// Create settings from connection parameters and pool configuration.
    #[must_use]
    pub fn new(connection: ConnectionConfig, pool: PoolConfig) -> Self {
        Self { connection, pool }
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        Ok(())
    }
}

/// The value unchanged, unless it is absent or only whitespace.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

fn whole_seconds(timeout: Duration) -> u64 {
    let secs = timeout
        .as_secs()
        .saturating_add(u64::from(timeout.subsec_nanos() > 0));
    secs.max(1)
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn tokenize(conn_str: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = conn_str.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(DbError::Config(format!("missing '=' after key: {key}")));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => break,
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(DbError::Config(format!(
                            "unterminated quoted value for key: {key}"
                        )));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

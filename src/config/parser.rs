use crate::error::{Error, Result};
use crate::server::lifecycle::{
    BootSettings, DEFAULT_BOOT_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_STOP_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that receives the connection URI by default.
pub const DEFAULT_ENV_VAR: &str = "PGURL";

/// How the PostgreSQL server is launched and supervised.
///
/// Spelled `pgCtl` / `raw` both in JSON and on the command line; `pg-ctl`
/// is accepted as an alias in either place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ServerStrategy {
    /// Use `pg_ctl start -w` / `pg_ctl stop`
    #[default]
    #[serde(alias = "pg-ctl")]
    #[value(name = "pgCtl", alias = "pg-ctl")]
    PgCtl,
    /// Run `postgres` directly and supervise its boot
    Raw,
}

/// Configuration for a single disposable server instance.
///
/// Created once before boot and never changed afterwards.
///
/// # Examples
///
/// ```
/// use pgvenv::config::ServerConfig;
/// use std::path::PathBuf;
///
/// let config = ServerConfig {
///     bin_dir: PathBuf::from("/usr/lib/postgresql/16/bin"),
///     data_dir: PathBuf::from("/tmp/pgvenv/pgdata"),
///     socket_dir: PathBuf::from("/tmp/pgvenv/pgsock"),
///     log_path: PathBuf::from("/tmp/pgvenv/postgres.log"),
///     host: "localhost".to_string(),
///     port: 5433,
///     database: "postgres".to_string(),
///     options: vec!["-F".to_string()],
/// };
/// assert_eq!(config.port, 5433);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory containing `postgres`, `pg_ctl` and `pg_isready`
    pub bin_dir: PathBuf,
    /// Cluster data directory
    pub data_dir: PathBuf,
    /// Directory for the Unix-domain socket
    pub socket_dir: PathBuf,
    /// Server log file (used by the `pg_ctl` strategy)
    pub log_path: PathBuf,
    /// Host name the server binds
    pub host: String,
    /// TCP port the server listens on
    pub port: u16,
    /// Database clients connect to
    pub database: String,
    /// Extra server option tokens, appended after the standard ones
    pub options: Vec<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_database() -> String {
    "postgres".to_string()
}

// Disposable cluster: durability is not needed, so fsync is off.
fn default_server_options() -> Vec<String> {
    vec!["-F".to_string()]
}

fn default_initdb_options() -> Vec<String> {
    vec!["-A".to_string(), "trust".to_string()]
}

fn default_boot_timeout_secs() -> u64 {
    DEFAULT_BOOT_TIMEOUT.as_secs()
}

fn default_poll_interval_millis() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_stop_timeout_secs() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_secs()
}

fn default_env_var() -> String {
    DEFAULT_ENV_VAR.to_string()
}

/// Main configuration for a pgvenv run.
///
/// Every field is optional in JSON; missing fields take the defaults shown
/// below.
///
/// # JSON Schema
///
/// ```json
/// {
///   "strategy": "pgCtl",
///   "binDir": "/usr/lib/postgresql/16/bin",
///   "host": "localhost",
///   "database": "postgres",
///   "port": 5433,
///   "serverOptions": ["-F"],
///   "initdbOptions": ["-A", "trust"],
///   "bootTimeoutSecs": 60,
///   "pollIntervalMillis": 1000,
///   "stopTimeoutSecs": 10,
///   "envVar": "PGURL"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VenvConfig {
    /// Server launch strategy
    #[serde(default)]
    pub strategy: ServerStrategy,

    /// PostgreSQL binary directory; discovered with `pg_config` when absent
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,

    /// Host name the server binds
    #[serde(default = "default_host")]
    pub host: String,

    /// Database exposed to the user command
    #[serde(default = "default_database")]
    pub database: String,

    /// Fixed port; a free port is allocated when absent
    #[serde(default)]
    pub port: Option<u16>,

    /// Extra server option tokens
    #[serde(default = "default_server_options")]
    pub server_options: Vec<String>,

    /// Option tokens forwarded to `initdb`
    #[serde(default = "default_initdb_options")]
    pub initdb_options: Vec<String>,

    /// Boot deadline in seconds
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,

    /// Delay between readiness polls in milliseconds
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,

    /// Deadline for the server to exit on stop, in seconds
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Environment variable that receives the connection URI
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

impl Default for VenvConfig {
    fn default() -> Self {
        Self {
            strategy: ServerStrategy::default(),
            bin_dir: None,
            host: default_host(),
            database: default_database(),
            port: None,
            server_options: default_server_options(),
            initdb_options: default_initdb_options(),
            boot_timeout_secs: default_boot_timeout_secs(),
            poll_interval_millis: default_poll_interval_millis(),
            stop_timeout_secs: default_stop_timeout_secs(),
            env_var: default_env_var(),
        }
    }
}

impl VenvConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the file cannot be read or is not a
    /// valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        Self::parse_from_str(&content)
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the string is not valid JSON or
    /// contains unknown or mistyped fields.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Timing settings for boot and stop
    pub fn boot_settings(&self) -> BootSettings {
        BootSettings {
            timeout: Duration::from_secs(self.boot_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_millis),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

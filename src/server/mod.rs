//! PostgreSQL server management.
//!
//! This module launches a disposable PostgreSQL server, waits for it to
//! accept connections and tears it down again. Two interchangeable
//! strategies implement the [`PostgresServer`] trait:
//!
//! - [`RawPostgresServer`] runs the `postgres` binary directly and supervises
//!   its boot itself, racing readiness polls against early exit and a deadline.
//! - [`PgCtlPostgresServer`] delegates start-up waiting to `pg_ctl start -w`.
//!
//! Callers only depend on the trait and pick a strategy through
//! [`build_server`].

pub mod lifecycle;
pub mod monitor;
mod pg_ctl;
mod process;

pub use lifecycle::{BootOutcome, BootSettings};
pub use monitor::{NotReady, PgIsReadyProbe, ProbeStatus, ReadinessProbe};
pub use pg_ctl::PgCtlPostgresServer;
pub use process::RawPostgresServer;

use crate::config::{ServerConfig, ServerStrategy};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Where clients should connect to reach the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    /// Host name the server binds
    pub host: String,
    /// TCP port the server listens on
    pub port: u16,
    /// Database clients should connect to
    pub database: String,
}

impl ConnectionDescriptor {
    /// Create a new descriptor
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    /// Connection address in `postgresql://host:port/database` form
    ///
    /// # Examples
    ///
    /// ```
    /// use pgvenv::server::ConnectionDescriptor;
    ///
    /// let descriptor = ConnectionDescriptor::new("localhost", 5433, "postgres");
    /// assert_eq!(descriptor.uri(), "postgresql://localhost:5433/postgres");
    /// ```
    pub fn uri(&self) -> String {
        format!("postgresql://{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

impl From<&ServerConfig> for ConnectionDescriptor {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.database.clone())
    }
}

/// Status of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Server is booting
    Starting,
    /// Server is ready for connections
    Running,
    /// Server is shutting down
    Stopping,
    /// No server process is tracked
    Stopped,
    /// Server failed to boot
    Failed,
}

/// A disposable PostgreSQL server.
///
/// `start` either leaves a ready server behind or no server at all.
/// `stop` is idempotent: stopping a server that is not running is a no-op.
#[async_trait]
pub trait PostgresServer: Send {
    /// Boot the server and wait until it accepts connections
    async fn start(&mut self) -> Result<()>;

    /// Shut the server down and wait for it to exit
    async fn stop(&mut self) -> Result<()>;

    /// Where clients should connect
    fn connection_descriptor(&self) -> ConnectionDescriptor;

    /// Current status
    fn status(&self) -> ServerStatus;
}

/// Build the server variant selected by `strategy`
pub fn build_server(
    strategy: ServerStrategy,
    config: ServerConfig,
    settings: BootSettings,
) -> Box<dyn PostgresServer> {
    match strategy {
        ServerStrategy::PgCtl => Box::new(PgCtlPostgresServer::new(config, settings)),
        ServerStrategy::Raw => {
            let probe = Arc::new(PgIsReadyProbe::new(&config.bin_dir));
            Box::new(RawPostgresServer::new(config, settings, probe))
        }
    }
}

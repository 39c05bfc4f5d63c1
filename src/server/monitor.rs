use crate::exec::{self, NormalizedStatus};
use crate::server::ConnectionDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Why a server is not accepting connections yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    /// Server responded but rejected the connection (usually still starting up)
    ConnectionRefused,
    /// Server did not respond at all
    NoResponse,
}

/// Result of a single readiness poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Server is accepting connections
    Ready,
    /// Server is not ready yet; poll again later
    NotReady(NotReady),
    /// Probe failed in a way that retrying will not fix
    Error(String),
}

impl ProbeStatus {
    /// Classifies a health-check exit status.
    ///
    /// Follows the `pg_isready` convention: 0 ready, 1 refused,
    /// 2 no response, anything else an error.
    pub fn from_exit_status(status: NormalizedStatus, output: &str) -> Self {
        match status {
            NormalizedStatus::Success => ProbeStatus::Ready,
            NormalizedStatus::ExitCode(1) => ProbeStatus::NotReady(NotReady::ConnectionRefused),
            NormalizedStatus::ExitCode(2) => ProbeStatus::NotReady(NotReady::NoResponse),
            other => ProbeStatus::Error(format!("{}; detail: {}", other, output.trim())),
        }
    }
}

/// One-shot readiness check against a connection descriptor.
///
/// Implementations must be stateless from the caller's point of view and
/// safe to call repeatedly.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Polls the server once.
    async fn poll(&self, descriptor: &ConnectionDescriptor) -> ProbeStatus;
}

/// Readiness probe backed by `pg_isready`
#[derive(Debug, Clone)]
pub struct PgIsReadyProbe {
    /// Path to the `pg_isready` executable
    path: PathBuf,
}

impl PgIsReadyProbe {
    /// Create a probe for `pg_isready` inside the given binary directory
    pub fn new(bin_dir: &Path) -> Self {
        Self {
            path: bin_dir.join("pg_isready"),
        }
    }

    /// Create a probe for an explicit executable path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the probed executable
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReadinessProbe for PgIsReadyProbe {
    async fn poll(&self, descriptor: &ConnectionDescriptor) -> ProbeStatus {
        let dbname = format!("--dbname={}", descriptor.uri());
        match exec::run(&self.path, &[dbname]).await {
            Ok((output, status)) => {
                let result = ProbeStatus::from_exit_status(status, &output);
                tracing::trace!(uri = %descriptor, status = ?result, "Polled pg_isready");
                result
            }
            Err(e) => ProbeStatus::Error(e.to_string()),
        }
    }
}

use crate::config::ServerConfig;
use crate::error::{BootFailure, Error, Result};
use crate::exec;
use crate::options::format_options;
use crate::server::lifecycle::BootSettings;
use crate::server::{ConnectionDescriptor, PostgresServer, ServerStatus};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Shutdown mode used by [`PgCtlPostgresServer::stop`]
const STOP_MODE: &str = "fast";
/// Shutdown mode used when cleaning up after a failure
const ABORT_MODE: &str = "immediate";

fn whole_seconds(duration: Duration) -> String {
    duration.as_secs().max(1).to_string()
}

/// PostgreSQL server controlled through `pg_ctl`.
///
/// `pg_ctl start -w` does the readiness waiting itself, bounded by the boot
/// timeout. A failed start is followed by an immediate-mode stop so no
/// half-started server is left behind. If the value is dropped while the
/// server is running or still starting, an immediate-mode stop is issued
/// from `Drop`.
pub struct PgCtlPostgresServer {
    /// Server configuration
    config: ServerConfig,
    /// Boot and stop timing
    settings: BootSettings,
    /// Whether `pg_ctl start` succeeded and no stop has succeeded since
    running: bool,
    /// Server status
    status: ServerStatus,
}

impl PgCtlPostgresServer {
    /// Create a new, not yet started server
    pub fn new(config: ServerConfig, settings: BootSettings) -> Self {
        Self {
            config,
            settings,
            running: false,
            status: ServerStatus::Stopped,
        }
    }

    fn pg_ctl(&self) -> PathBuf {
        self.config.bin_dir.join("pg_ctl")
    }

    /// Options forwarded to the server through `pg_ctl -o`
    pub fn server_options(&self) -> String {
        let mut tokens = vec![
            "-i".to_string(),
            "-h".to_string(),
            self.config.host.clone(),
            "-p".to_string(),
            self.config.port.to_string(),
            "-k".to_string(),
            self.config.socket_dir.display().to_string(),
        ];
        tokens.extend(self.config.options.iter().cloned());
        format_options(&tokens)
    }

    /// Arguments passed to `pg_ctl` to boot the server
    pub fn start_args(&self) -> Vec<OsString> {
        vec![
            "start".into(),
            "-w".into(),
            "-t".into(),
            whole_seconds(self.settings.timeout).into(),
            "-o".into(),
            self.server_options().into(),
            "-D".into(),
            self.config.data_dir.clone().into_os_string(),
            "-l".into(),
            self.config.log_path.clone().into_os_string(),
        ]
    }

    /// Arguments passed to `pg_ctl` to shut the server down
    pub fn stop_args(&self, mode: &str) -> Vec<OsString> {
        vec![
            "stop".into(),
            "-w".into(),
            "-t".into(),
            whole_seconds(self.settings.stop_timeout).into(),
            "-D".into(),
            self.config.data_dir.clone().into_os_string(),
            "-m".into(),
            mode.into(),
        ]
    }

    async fn abort_start(&self) {
        match exec::run(self.pg_ctl(), &self.stop_args(ABORT_MODE)).await {
            Ok((_, status)) if status.success() => {
                tracing::debug!("Stopped partially started server");
            }
            // Usually means nothing was left running.
            Ok((output, status)) => {
                tracing::debug!(%status, output = %output.trim(), "Cleanup stop reported failure");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to run cleanup stop"),
        }
    }
}

#[async_trait]
impl PostgresServer for PgCtlPostgresServer {
    #[tracing::instrument(skip(self), fields(port = self.config.port))]
    async fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(Error::AlreadyRunning);
        }
        self.status = ServerStatus::Starting;

        let status = match exec::run_attached(self.pg_ctl(), &self.start_args(), &[]).await {
            Ok(status) => status,
            Err(e) => {
                self.status = ServerStatus::Failed;
                return Err(match e {
                    Error::Process(detail) => Error::Spawn(detail),
                    other => other,
                });
            }
        };

        if !status.success() {
            tracing::error!(%status, "pg_ctl start failed");
            self.abort_start().await;
            self.status = ServerStatus::Failed;
            return Err(BootFailure::TerminatedEarly(format!(
                "pg_ctl start failed with {}; see {}",
                status,
                self.config.log_path.display()
            ))
            .into());
        }

        self.running = true;
        self.status = ServerStatus::Running;
        tracing::info!("postgres server ready");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(port = self.config.port))]
    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            tracing::debug!("Server not running; nothing to stop");
            return Ok(());
        }
        self.status = ServerStatus::Stopping;
        tracing::info!("Stopping postgres server");

        let (output, status) = exec::run(self.pg_ctl(), &self.stop_args(STOP_MODE))
            .await
            .map_err(|e| Error::Stop(e.to_string()))?;
        if !status.success() {
            return Err(Error::Stop(format!(
                "pg_ctl stop failed with {}; details: {}",
                status,
                output.trim()
            )));
        }

        self.running = false;
        self.status = ServerStatus::Stopped;
        Ok(())
    }

    fn connection_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::from(&self.config)
    }

    fn status(&self) -> ServerStatus {
        self.status
    }
}

impl Drop for PgCtlPostgresServer {
    fn drop(&mut self) {
        // A start cancelled mid-flight may have left a detached server behind.
        if !self.running && self.status != ServerStatus::Starting {
            return;
        }
        tracing::warn!("Server dropped while running; stopping it");
        let args = self.stop_args(ABORT_MODE);
        if let Err(e) = futures_lite::future::block_on(exec::run(self.pg_ctl(), &args)) {
            tracing::error!(error = %e, "Failed to stop server on drop");
        }
    }
}

// src/server/process.rs
use crate::config::ServerConfig;
use crate::error::{BootFailure, Error, Result};
use crate::exec::{self, NormalizedStatus};
use crate::server::lifecycle::{self, BootOutcome, BootSettings};
use crate::server::monitor::ReadinessProbe;
use crate::server::{ConnectionDescriptor, PostgresServer, ServerStatus};
use async_process::Child;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

/// How the watcher task saw the server process end
enum Reaped {
    /// The process exited on its own
    Exited(io::Result<ExitStatus>),
    /// The process was killed on request
    Killed(io::Result<ExitStatus>),
    /// The kill request could not be issued; the child is handed back
    KillFailed(io::Error, Child),
}

/// A launched server process.
///
/// The child is owned by a watcher task that resolves when the process
/// exits. Sending on (or dropping) `kill_tx` makes the watcher kill the
/// process and reap it.
struct Subordinate {
    pid: u32,
    kill_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<Reaped>,
}

impl Subordinate {
    fn watch(mut child: Child) -> Self {
        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let watcher = tokio::spawn(async move {
            tokio::select! {
                status = child.status() => return Reaped::Exited(status),
                _ = kill_rx => {}
            }
            match child.kill() {
                Ok(()) => Reaped::Killed(child.status().await),
                Err(e) => Reaped::KillFailed(e, child),
            }
        });

        Self {
            pid,
            kill_tx: Some(kill_tx),
            watcher,
        }
    }
}

fn describe_exit(reaped: std::result::Result<Reaped, JoinError>) -> String {
    match reaped {
        Ok(Reaped::Exited(Ok(status))) | Ok(Reaped::Killed(Ok(status))) => {
            NormalizedStatus::from(status).to_string()
        }
        Ok(Reaped::Exited(Err(e))) | Ok(Reaped::Killed(Err(e))) => {
            format!("failed to wait for process: {}", e)
        }
        Ok(Reaped::KillFailed(e, _)) => format!("failed to kill process: {}", e),
        Err(e) => format!("process watcher failed: {}", e),
    }
}

/// PostgreSQL server launched and supervised directly.
///
/// Runs the `postgres` binary from the configured binary directory with its
/// output streamed to ours. [`start`](PostgresServer::start) races a
/// [`ReadinessProbe`] against early exit of the process and the boot
/// deadline; any outcome but ready kills the process before the error is
/// returned.
pub struct RawPostgresServer {
    /// Server configuration
    config: ServerConfig,
    /// Boot and stop timing
    settings: BootSettings,
    /// Readiness probe used during boot
    probe: Arc<dyn ReadinessProbe>,
    /// Running server process, if any
    process: Option<Subordinate>,
    /// Whether the last boot confirmed readiness
    launched_cleanly: bool,
    /// Server status
    status: ServerStatus,
}

impl RawPostgresServer {
    /// Create a new, not yet started server
    pub fn new(
        config: ServerConfig,
        settings: BootSettings,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            config,
            settings,
            probe,
            process: None,
            launched_cleanly: false,
            status: ServerStatus::Stopped,
        }
    }

    /// Process id of the running server, if one is tracked
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid)
    }

    /// Whether the server was confirmed ready by the last start
    pub fn launched_cleanly(&self) -> bool {
        self.launched_cleanly
    }

    /// Arguments passed to `postgres`
    pub fn server_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            "-h".into(),
            self.config.host.clone().into(),
            "-p".into(),
            self.config.port.to_string().into(),
            "-k".into(),
            self.config.socket_dir.clone().into_os_string(),
            "-D".into(),
            self.config.data_dir.clone().into_os_string(),
        ];
        args.extend(self.config.options.iter().map(OsString::from));
        args
    }

    /// Kills the tracked process and waits for it to be reaped.
    ///
    /// The process stays tracked until its exit is confirmed, so a failed
    /// attempt can be retried by calling `stop` again.
    async fn kill_tracked(&mut self) -> Result<()> {
        let Some(subordinate) = self.process.as_mut() else {
            tracing::debug!("No server process tracked; nothing to stop");
            return Ok(());
        };
        self.status = ServerStatus::Stopping;
        let pid = subordinate.pid;

        if let Some(kill_tx) = subordinate.kill_tx.take() {
            // Fails only if the watcher already saw the process exit.
            let _ = kill_tx.send(());
        }

        let stop_timeout = self.settings.stop_timeout;
        let Ok(reaped) = tokio::time::timeout(stop_timeout, &mut subordinate.watcher).await else {
            tracing::error!(pid, "Server process did not exit in time");
            return Err(Error::Stop(format!(
                "postgres server (pid {}) did not exit within {:?}",
                pid, stop_timeout
            )));
        };

        // The watcher has resolved and cannot be awaited again.
        self.process = None;
        match reaped {
            Ok(Reaped::KillFailed(e, child)) => {
                tracing::error!(pid, error = %e, "Failed to kill server process");
                self.process = Some(Subordinate::watch(child));
                Err(Error::Stop(format!("Failed to kill process {}: {}", pid, e)))
            }
            Err(e) => Err(Error::Stop(format!("process watcher failed: {}", e))),
            Ok(reaped) => {
                tracing::debug!(pid, exit = %describe_exit(Ok(reaped)), "Server process reaped");
                self.status = ServerStatus::Stopped;
                Ok(())
            }
        }
    }

    /// Cleans up after a boot that did not reach readiness.
    ///
    /// `leftover` is the process still to be killed, if it has not exited on
    /// its own. A failed kill is reported as [`Error::Stop`] and leaves the
    /// process tracked.
    async fn fail_boot(&mut self, leftover: Option<Subordinate>, failure: BootFailure) -> Error {
        if let Some(subordinate) = leftover {
            self.process = Some(subordinate);
            if let Err(stop_error) = self.kill_tracked().await {
                tracing::error!(error = %stop_error, "Failed to stop server after failed boot");
                self.status = ServerStatus::Failed;
                let detail = match stop_error {
                    Error::Stop(detail) => detail,
                    other => other.to_string(),
                };
                return Error::Stop(format!("{}; cleanup also failed: {}", failure, detail));
            }
        }
        self.status = ServerStatus::Failed;
        failure.into()
    }
}

#[async_trait]
impl PostgresServer for RawPostgresServer {
    #[tracing::instrument(skip(self), fields(port = self.config.port))]
    async fn start(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Err(Error::AlreadyRunning);
        }

        self.status = ServerStatus::Starting;
        self.launched_cleanly = false;

        let postgres = self.config.bin_dir.join("postgres");
        let child = exec::spawn_attached(&postgres, &self.server_args()).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to launch postgres");
            self.status = ServerStatus::Failed;
        })?;
        // Dropping this before it is tracked kills the process.
        let mut subordinate = Subordinate::watch(child);
        tracing::info!(pid = subordinate.pid, "Launched postgres server");

        let outcome = {
            let watcher = &mut subordinate.watcher;
            lifecycle::race_boot(
                Arc::clone(&self.probe),
                self.connection_descriptor(),
                &self.settings,
                async move { describe_exit(watcher.await) },
            )
            .await
        };

        let exited = matches!(outcome, BootOutcome::TerminatedEarly(_));
        match outcome.into_result(self.settings.timeout) {
            Ok(()) => {
                self.process = Some(subordinate);
                self.launched_cleanly = true;
                self.status = ServerStatus::Running;
                tracing::info!("postgres server ready");
                Ok(())
            }
            Err(failure) => {
                tracing::error!(error = %failure, "Error during boot");
                let leftover = (!exited).then_some(subordinate);
                Err(self.fail_boot(leftover, failure).await)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(port = self.config.port))]
    async fn stop(&mut self) -> Result<()> {
        if self.process.is_some() {
            tracing::info!("Stopping postgres server");
        }
        self.kill_tracked().await
    }

    fn connection_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::from(&self.config)
    }

    fn status(&self) -> ServerStatus {
        self.status
    }
}

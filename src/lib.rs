/*!
 # pgvenv

 Run a command against a throwaway PostgreSQL server.

 ## Overview

 pgvenv provides functionality to:
 - Locate the installed PostgreSQL binaries with `pg_config`
 - Initialize a fresh cluster in a temporary workspace
 - Boot a server on a free port and wait until it accepts connections
 - Run a user command with the connection URI in its environment
 - Tear the server and workspace down again, whatever happened

 ## Basic Usage

 ```no_run
 use pgvenv::{PgVenv, Result};
 use pgvenv::config::VenvConfig;

 #[tokio::main]
 async fn main() -> Result<()> {
     let venv = PgVenv::new(VenvConfig::default());

     // PGURL is set for the command only
     let command = vec!["psql \"$PGURL\" -c 'select 1'".to_string()];
     let status = venv.run(&command).await?;

     println!("User command finished with {}", status);
     Ok(())
 }
 ```

 ## Features

 - **Two server strategies**: `pg_ctl` managed, or `postgres` supervised directly
 - **Bounded boot**: readiness, early exit and a deadline race; a failed boot
   never leaves a server running
 - **Scoped cleanup**: server and workspace are released on every exit path
 - **Exit-code fidelity**: the user command's status is kept apart from
   internal failures (see [`error`])
*/

pub mod config;
pub mod error;
pub mod exec;
pub mod net;
pub mod options;
pub mod server;
pub mod shell;
pub mod toolchain;
pub mod workspace;

pub use config::{ServerConfig, ServerStrategy, VenvConfig};
pub use error::{Error, Result};
pub use exec::NormalizedStatus;
pub use server::{ConnectionDescriptor, PostgresServer, ServerStatus};

use std::path::Path;
use uuid::Uuid;
use workspace::Workspace;

/// Prefix of the temporary workspace directory
const WORKSPACE_PREFIX: &str = "pgvenv_";

/// Provision a disposable PostgreSQL server around a user command
///
/// This struct is the main entry point. Every call to [`PgVenv::run`] gets
/// its own workspace, data directory and server.
/// All public methods are instrumented with `tracing` spans.
pub struct PgVenv {
    /// Configuration
    config: VenvConfig,
    /// Identifier attached to log output
    run_id: Uuid,
}

impl PgVenv {
    /// Create a new runner from a configuration
    pub fn new(config: VenvConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Create a new runner from a configuration file path
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = VenvConfig::from_file(path)?;
        Ok(Self::new(config))
    }

    /// The configuration in use
    pub fn config(&self) -> &VenvConfig {
        &self.config
    }

    /// Identifier of this runner in log output
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Provision a server, run `command` against it and tear everything down.
    ///
    /// Returns the user command's status. Any failure to provision, boot or
    /// stop the server is returned as an error instead, after the workspace
    /// (and any server) has been cleaned up.
    #[tracing::instrument(skip(self, command), fields(run_id = %self.run_id))]
    pub async fn run(&self, command: &[String]) -> Result<NormalizedStatus> {
        config::validate_config(&self.config)?;
        shell::user_command(command)?;

        let bin_dir = match &self.config.bin_dir {
            Some(dir) => dir.clone(),
            None => toolchain::locate_bin_dir().await?,
        };

        let run_tag = self.run_id.simple().to_string();
        let prefix = format!("{}{}_", WORKSPACE_PREFIX, &run_tag[..8]);
        let workspace = Workspace::create(&prefix)?;
        tracing::info!(work_dir = %workspace.path().display(), "Created workspace");

        let result = self.run_in(&bin_dir, &workspace, command).await;
        let closed = workspace.close();

        let status = result?;
        closed?;
        Ok(status)
    }

    async fn run_in(
        &self,
        bin_dir: &Path,
        workspace: &Workspace,
        command: &[String],
    ) -> Result<NormalizedStatus> {
        toolchain::init_data_dir(bin_dir, workspace.data_dir(), &self.config.initdb_options)
            .await?;

        let port = match self.config.port {
            Some(port) => port,
            None => net::allocate_free_port().await?,
        };
        tracing::info!(port, "Using port");

        let server_config = ServerConfig {
            bin_dir: bin_dir.to_path_buf(),
            data_dir: workspace.data_dir().to_path_buf(),
            socket_dir: workspace.socket_dir().to_path_buf(),
            log_path: workspace.log_path().to_path_buf(),
            host: self.config.host.clone(),
            port,
            database: self.config.database.clone(),
            options: self.config.server_options.clone(),
        };

        let mut server = server::build_server(
            self.config.strategy,
            server_config,
            self.config.boot_settings(),
        );
        self.run_with_server(server.as_mut(), command).await
    }

    /// Boot `server`, run `command` against it, then stop the server.
    ///
    /// The server is stopped even when the command cannot be run. A stop
    /// failure is reported unless the command itself already failed.
    #[tracing::instrument(skip(self, server, command), fields(run_id = %self.run_id))]
    pub async fn run_with_server(
        &self,
        server: &mut dyn PostgresServer,
        command: &[String],
    ) -> Result<NormalizedStatus> {
        server.start().await?;

        let uri = server.connection_descriptor().uri();
        tracing::info!(%uri, env_var = %self.config.env_var, "Server ready");
        let envs = vec![(self.config.env_var.clone(), uri)];

        let outcome = shell::run_user_command(command, &envs).await;
        let stopped = server.stop().await;

        match (outcome, stopped) {
            (Ok(status), Ok(())) => Ok(status),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_error)) => {
                tracing::error!(error = %stop_error, "Failed to stop server");
                Err(e)
            }
        }
    }
}

/// Exit status the `pgvenv` binary reports for a run result.
///
/// The user command's own code is passed through; internal failures map to
/// the reserved codes in [`error`].
pub fn exit_code(result: &Result<NormalizedStatus>) -> i32 {
    match result {
        Ok(status) => status.code().unwrap_or(error::EXIT_UNKNOWN_STATUS),
        Err(e) => e.exit_code(),
    }
}

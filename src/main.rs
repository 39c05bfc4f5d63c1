//! Binary entry point for the pgvenv CLI.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use pgvenv::config::{ServerStrategy, VenvConfig};
use pgvenv::error::{EXIT_INTERNAL, Error};
use pgvenv::{NormalizedStatus, PgVenv, Result};

const DEFAULT_LOG_FILTER: &str = "pgvenv=info";

#[derive(Debug, Parser)]
#[command(
    name = "pgvenv",
    version,
    about = "Run a command against a disposable PostgreSQL server",
    long_about = "Boots a throwaway PostgreSQL server, exports its connection URI \
                  (PGURL by default) to COMMAND, runs it, and removes the server \
                  afterwards. Exits with COMMAND's exit status; 123 (environment), \
                  124 (boot) and 125 (teardown) report pgvenv's own failures."
)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "PGVENV_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured server strategy.
    #[arg(long, value_enum)]
    strategy: Option<ServerStrategy>,

    /// Command to run once the server is ready (use -- to separate flags).
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<VenvConfig> {
    let mut config = match &cli.config {
        Some(path) => VenvConfig::from_file(path)?,
        None => VenvConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<NormalizedStatus> {
    let venv = PgVenv::new(load_config(&cli)?);
    tokio::select! {
        result = venv.run(&cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; cleaning up");
            Err(Error::Interrupted)
        }
    }
}

fn write_error(mut target: impl Write, err: &Error) {
    writeln!(target, "pgvenv: {err}").ok();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = dispatch(cli).await;
    if let Err(err) = &result {
        write_error(io::stderr(), err);
    }

    let code = pgvenv::exit_code(&result);
    ExitCode::from(u8::try_from(code).unwrap_or(EXIT_INTERNAL as u8))
}

//! Locating and preparing the installed PostgreSQL tools.

use crate::error::{Error, Result};
use crate::exec;
use crate::options::format_options;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Finds the PostgreSQL binary directory with `pg_config --bindir`.
///
/// # Errors
///
/// Returns [`Error::Environment`] if `pg_config` is missing, fails, or
/// prints nothing.
pub async fn locate_bin_dir() -> Result<PathBuf> {
    locate_bin_dir_with("pg_config").await
}

/// Like [`locate_bin_dir`] with an explicit `pg_config` executable.
pub async fn locate_bin_dir_with(pg_config: impl AsRef<Path>) -> Result<PathBuf> {
    let (output, status) = exec::run(pg_config.as_ref(), &["--bindir"])
        .await
        .map_err(|e| Error::Environment(format!("Failed to run pg_config: {}", e)))?;

    if !status.success() {
        return Err(Error::Environment(format!(
            "pg_config failed with {}; details: {}",
            status,
            output.trim()
        )));
    }

    let bin_dir = output.trim();
    if bin_dir.is_empty() {
        return Err(Error::Environment(
            "pg_config did not report a binary directory".to_string(),
        ));
    }

    tracing::info!(bin_dir, "Located PostgreSQL binaries");
    Ok(PathBuf::from(bin_dir))
}

/// Arguments passed to `pg_ctl` to initialize a data directory
pub fn initdb_args(data_dir: &Path, initdb_options: &[String]) -> Vec<OsString> {
    vec![
        "initdb".into(),
        "-o".into(),
        format_options(initdb_options).into(),
        "--pgdata".into(),
        data_dir.as_os_str().to_owned(),
    ]
}

/// Initializes a new cluster in `data_dir` with `pg_ctl initdb`.
///
/// # Errors
///
/// Returns [`Error::Environment`] if `pg_ctl` cannot be run or exits with a
/// nonzero status; the message carries the tool's output.
#[tracing::instrument(skip(bin_dir, initdb_options), fields(data_dir = %data_dir.display()))]
pub async fn init_data_dir(bin_dir: &Path, data_dir: &Path, initdb_options: &[String]) -> Result<()> {
    let pg_ctl = bin_dir.join("pg_ctl");
    let (output, status) = exec::run(&pg_ctl, &initdb_args(data_dir, initdb_options))
        .await
        .map_err(|e| Error::Environment(format!("Failed to run initdb: {}", e)))?;

    if !status.success() {
        return Err(Error::Environment(format!(
            "initdb failed with {}; details: {}",
            status,
            output.trim()
        )));
    }

    tracing::debug!("Initialized data directory");
    Ok(())
}

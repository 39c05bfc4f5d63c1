//! Disposable workspace for a single run.
//!
//! The workspace is a fresh temporary directory holding the cluster data
//! directory, the socket directory and the server log. It is removed exactly
//! once: by [`Workspace::close`] on the normal path (where removal errors are
//! reported), or when the value is dropped on any other path.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DATA_DIR: &str = "pgdata";
const SOCKET_DIR: &str = "pgsock";
const LOG_FILE: &str = "postgres.log";

/// Temporary directory tree owned by a run
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
    data_dir: PathBuf,
    socket_dir: PathBuf,
    log_path: PathBuf,
}

impl Workspace {
    /// Create a workspace under the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if any directory cannot be created.
    pub fn create(prefix: &str) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| Error::Environment(format!("Failed to create workspace: {}", e)))?;
        Self::layout(root)
    }

    /// Create a workspace inside `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if any directory cannot be created.
    pub fn create_in(parent: &Path, prefix: &str) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| Error::Environment(format!("Failed to create workspace: {}", e)))?;
        Self::layout(root)
    }

    fn layout(root: TempDir) -> Result<Self> {
        let data_dir = root.path().join(DATA_DIR);
        let socket_dir = root.path().join(SOCKET_DIR);
        let log_path = root.path().join(LOG_FILE);

        for dir in [&data_dir, &socket_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Environment(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        tracing::debug!(root = %root.path().display(), "Created workspace");
        Ok(Self {
            root,
            data_dir,
            socket_dir,
            log_path,
        })
    }

    /// Root of the workspace
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Cluster data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Unix-domain socket directory
    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    /// Server log file path (may not exist yet)
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Remove the workspace recursively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] if removal fails.
    pub fn close(self) -> Result<()> {
        let path = self.root.path().to_path_buf();
        self.root.close().map_err(|e| {
            Error::Environment(format!("Failed to remove workspace {}: {}", path.display(), e))
        })?;
        tracing::debug!(root = %path.display(), "Removed workspace");
        Ok(())
    }
}

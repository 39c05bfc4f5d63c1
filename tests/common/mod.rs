// Shared helpers for the integration tests: fake PostgreSQL tool
// directories built from small shell scripts.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use pgvenv::config::ServerConfig;
use pgvenv::server::BootSettings;

/// `pg_ctl` that records its arguments and succeeds.
pub const RECORDING_PG_CTL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
exit 0
"#;

/// `pg_ctl` whose `start` fails.
pub const FAILING_START_PG_CTL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
if [ "$1" = "start" ]; then
  echo "pg_ctl: could not start server"
  exit 1
fi
exit 0
"#;

/// `pg_ctl` whose `initdb` fails.
pub const FAILING_INITDB_PG_CTL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
if [ "$1" = "initdb" ]; then
  echo "initdb: directory is not empty"
  exit 1
fi
exit 0
"#;

/// `postgres` that records its pid and stays up.
pub const LONG_RUNNING_POSTGRES: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/postgres.pid"
exec sleep 30
"#;

/// `postgres` that records its pid and dies straight away.
pub const CRASHING_POSTGRES: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/postgres.pid"
echo "FATAL: could not bind" 1>&2
exit 3
"#;

/// `pg_isready` reporting ready.
pub const READY_PG_ISREADY: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/probe.log"
exit 0
"#;

/// `pg_isready` that answers slowly and leaves a trace once it finishes.
pub const SLOW_PG_ISREADY: &str = r#"#!/bin/sh
sleep 1
echo late >> "$(dirname "$0")/late.log"
exit 2
"#;

/// A temporary directory of fake executables.
pub struct FakeBin {
    dir: TempDir,
}

impl FakeBin {
    pub fn new() -> Self {
        Self {
            dir: tempdir().expect("create fake bin dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Installs an executable script named `name`.
    pub fn install(&self, name: &str, script: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, script).expect("write fake tool");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = fs::metadata(&path).expect("stat fake tool").permissions();
            permissions.set_mode(0o755);
            fs::set_permissions(&path, permissions).expect("chmod fake tool");
        }
        path
    }

    /// Lines recorded by the fake tools in `calls.log`.
    pub fn calls(&self) -> Vec<String> {
        self.read_lines("calls.log")
    }

    pub fn read_lines(&self, file: &str) -> Vec<String> {
        fs::read_to_string(self.dir.path().join(file))
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Pid written by the fake `postgres`, once it has started.
    pub fn postgres_pid(&self) -> Option<u32> {
        read_pid(&self.pid_file())
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("postgres.pid")
    }

    /// Server configuration pointing at this directory.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bin_dir: self.path().to_path_buf(),
            data_dir: self.path().join("pgdata"),
            socket_dir: self.path().join("pgsock"),
            log_path: self.path().join("postgres.log"),
            host: "localhost".to_string(),
            port: 5433,
            database: "postgres".to_string(),
            options: vec!["-F".to_string()],
        }
    }
}

/// Short timings so failing boots resolve quickly.
pub fn fast_settings(timeout: Duration) -> BootSettings {
    BootSettings {
        timeout,
        poll_interval: Duration::from_millis(50),
        stop_timeout: Duration::from_secs(5),
    }
}

/// Whether a process with this pid still exists.
pub fn is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Pid stored in `path`, once it has been written completely.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|pid| pid.trim().parse().ok())
}

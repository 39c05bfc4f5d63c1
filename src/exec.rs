//! External program execution.
//!
//! Thin wrappers over `async_process` that run a program either with its
//! output captured ([`run`]) or streamed live to this process's stdio
//! ([`run_attached`], [`spawn_attached`]). Exit statuses are normalized into
//! [`NormalizedStatus`] so callers never have to interpret platform details.

use crate::error::{Error, Result};
use async_process::{Child, Command, Stdio};
use std::ffi::OsStr;
use std::fmt;
use std::process::ExitStatus;

/// Platform-independent view of how a program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedStatus {
    /// The program exited with status zero.
    Success,
    /// The program exited with the given nonzero code.
    ExitCode(i32),
    /// The platform could not report an exit code (e.g. killed by a signal).
    Unknown,
}

impl NormalizedStatus {
    /// The numeric exit code, if one was reported.
    pub fn code(&self) -> Option<i32> {
        match self {
            NormalizedStatus::Success => Some(0),
            NormalizedStatus::ExitCode(code) => Some(*code),
            NormalizedStatus::Unknown => None,
        }
    }

    /// Whether the program exited cleanly.
    pub fn success(&self) -> bool {
        matches!(self, NormalizedStatus::Success)
    }
}

impl From<ExitStatus> for NormalizedStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return NormalizedStatus::Success;
        }
        match status.code() {
            Some(code) => NormalizedStatus::ExitCode(code),
            None => NormalizedStatus::Unknown,
        }
    }
}

impl fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedStatus::Success => write!(f, "exit code 0"),
            NormalizedStatus::ExitCode(code) => write!(f, "exit code {}", code),
            NormalizedStatus::Unknown => write!(f, "unknown exit status"),
        }
    }
}

fn describe<P, A>(path: P, args: &[A]) -> String
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    let mut line = path.as_ref().to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

/// Runs a program to completion and captures its combined output.
///
/// Standard output is followed by standard error in the returned string.
/// Dropping the returned future kills the program.
///
/// # Errors
///
/// Returns [`Error::Process`] if the program cannot be started.
pub async fn run<P, A>(path: P, args: &[A]) -> Result<(String, NormalizedStatus)>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    tracing::debug!(command = %describe(&path, args), "Running captured");
    let output = Command::new(&path)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Process(format!("exec failed: {}: {}", describe(&path, args), e)))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    let status = NormalizedStatus::from(output.status);
    if status == NormalizedStatus::Unknown {
        tracing::warn!(command = %describe(&path, args), "Failed to extract exit code");
    }
    Ok((combined, status))
}

/// Runs a program to completion with its stdio attached to ours.
///
/// `envs` are applied on top of the inherited environment of this process;
/// the ambient environment itself is never modified. Dropping the returned
/// future kills the program.
///
/// # Errors
///
/// Returns [`Error::Process`] if the program cannot be started or waited on.
pub async fn run_attached<P, A>(
    path: P,
    args: &[A],
    envs: &[(String, String)],
) -> Result<NormalizedStatus>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    tracing::debug!(command = %describe(&path, args), "Running attached");
    let mut command = Command::new(&path);
    command.args(args).kill_on_drop(true);
    for (key, value) in envs {
        command.env(key, value);
    }

    let status = command.status().await.map_err(|e| {
        Error::Process(format!("Command failed to start: {}: {}", describe(&path, args), e))
    })?;

    let status = NormalizedStatus::from(status);
    if status == NormalizedStatus::Unknown {
        tracing::warn!(command = %describe(&path, args), "Failed to extract exit code");
    }
    Ok(status)
}

/// Spawns a long-running program with stdout/stderr streamed live.
///
/// The child is killed if its handle is dropped without being waited on.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the program cannot be started.
pub fn spawn_attached<P, A>(path: P, args: &[A]) -> Result<Child>
where
    P: AsRef<OsStr>,
    A: AsRef<OsStr>,
{
    tracing::debug!(command = %describe(&path, args), "Spawning attached");
    Command::new(&path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Spawn(format!("{}: {}", describe(&path, args), e)))
}

/// Error handling module for pgvenv.
///
/// This module defines the error types used throughout the library and the
/// exit-code convention the `pgvenv` binary applies to them.
///
/// # Example
///
/// ```
/// use pgvenv::error::{BootFailure, Error, Result};
///
/// fn handle_error(result: Result<i32>) {
///     match result {
///         Ok(code) => println!("User command exited with {}", code),
///         Err(Error::Boot(BootFailure::TimedOut(after))) => {
///             println!("Server was not ready after {:?}", after)
///         }
///         Err(Error::Environment(msg)) => println!("Environment problem: {}", msg),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::time::Duration;
use thiserror::Error;

/// Exit status used when the user command ends without a reportable exit code.
pub const EXIT_UNKNOWN_STATUS: i32 = 1;
/// Exit status used for command-line usage errors.
pub const EXIT_USAGE: i32 = 2;
/// Exit status used for environmental failures (discovery, workspace, initdb, port, config).
pub const EXIT_ENVIRONMENT: i32 = 123;
/// Exit status used when the server could not be booted.
pub const EXIT_BOOT: i32 = 124;
/// Exit status used when teardown failed or for any other internal fault.
pub const EXIT_INTERNAL: i32 = 125;
/// Exit status used when the run was interrupted (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Why a boot race ended without the server becoming ready.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootFailure {
    /// The server process exited on its own before it was confirmed ready.
    #[error("postgres server terminated during boot: {0}")]
    TerminatedEarly(String),

    /// The readiness probe reported something other than ready/not-ready.
    #[error("unexpected readiness probe error: {0}")]
    ProbeError(String),

    /// The server did not become ready within the boot deadline.
    #[error("timed out after {0:?} waiting for postgres server to accept connections")]
    TimedOut(Duration),
}

/// Errors that can occur in the pgvenv library.
///
/// Each variant carries enough context to be reported to the user verbatim.
/// The variants mirror the failure classes of a run: environmental problems
/// found before a server exists, boot failures, teardown failures and
/// configuration mistakes.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - Host, database or environment variable names are empty
    /// - Boot timeout or poll interval are zero
    /// - The poll interval exceeds the boot timeout
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The environment could not be prepared for a server.
    ///
    /// This error occurs when:
    /// - `pg_config` is missing or fails
    /// - The disposable workspace cannot be created or removed
    /// - `initdb` exits with a nonzero status
    /// - No free port can be reserved
    #[error("Environment error: {0}")]
    Environment(String),

    /// The server process could not be spawned at all.
    #[error("Failed to launch server process: {0}")]
    Spawn(String),

    /// The server was launched but never confirmed ready.
    ///
    /// The server process has already been stopped when this is returned.
    #[error("Boot failed: {0}")]
    Boot(#[from] BootFailure),

    /// The server could not be stopped.
    ///
    /// This error occurs when:
    /// - The termination request cannot be issued
    /// - The process does not exit within the stop timeout
    /// - `pg_ctl stop` exits with a nonzero status
    #[error("Failed to stop server: {0}")]
    Stop(String),

    /// The server is already running.
    ///
    /// This error occurs when:
    /// - Attempting to start a server that's already running
    #[error("Already running")]
    AlreadyRunning,

    /// Error running an external program.
    #[error("Process error: {0}")]
    Process(String),

    /// The command line was not usable.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The run was interrupted before it completed.
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Exit status the `pgvenv` binary reports for this error.
    ///
    /// Internal failures use a reserved high range so they are not confused
    /// with the user command's own (usually small) exit codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConfigParse(_) | Error::ConfigInvalid(_) | Error::Environment(_) => {
                EXIT_ENVIRONMENT
            }
            Error::Spawn(_) | Error::Boot(_) => EXIT_BOOT,
            Error::Stop(_) | Error::Process(_) | Error::AlreadyRunning => EXIT_INTERNAL,
            Error::Usage(_) => EXIT_USAGE,
            Error::Interrupted => EXIT_INTERRUPTED,
        }
    }
}

/// Result type for pgvenv operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_failure_class() {
        assert_eq!(Error::Environment("x".into()).exit_code(), EXIT_ENVIRONMENT);
        assert_eq!(Error::ConfigInvalid("x".into()).exit_code(), EXIT_ENVIRONMENT);
        assert_eq!(
            Error::Boot(BootFailure::TimedOut(Duration::from_secs(1))).exit_code(),
            EXIT_BOOT
        );
        assert_eq!(Error::Spawn("x".into()).exit_code(), EXIT_BOOT);
        assert_eq!(Error::Stop("x".into()).exit_code(), EXIT_INTERNAL);
        assert_eq!(Error::Usage("x".into()).exit_code(), EXIT_USAGE);
        assert_eq!(Error::Interrupted.exit_code(), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_boot_failure_message() {
        let err = Error::from(BootFailure::TerminatedEarly("exit code 3".into()));
        assert_eq!(
            err.to_string(),
            "Boot failed: postgres server terminated during boot: exit code 3"
        );
    }
}

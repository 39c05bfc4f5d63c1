//! Running the user's command.
//!
//! A single token is handed to the platform shell so it can contain pipes,
//! quoting and variable references (`pgvenv 'psql "$PGURL" -c "select 1"'`).
//! Several tokens are run as a program and its arguments with the argument
//! vector preserved (`pgvenv psql -c 'select 1'`). On Windows the tokens are
//! always passed to `cmd /c`, which reassembles the command line itself.

use crate::error::{Error, Result};
use crate::exec::{self, NormalizedStatus};

/// A resolved program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCommand {
    /// Program to execute
    pub program: String,
    /// Arguments for the program
    pub args: Vec<String>,
}

/// Resolves the user's tokens into a program invocation.
///
/// # Errors
///
/// Returns [`Error::Usage`] if no tokens are given.
pub fn user_command(tokens: &[String]) -> Result<UserCommand> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(Error::Usage(
            "No user command was given: nothing to do after starting postgres server".to_string(),
        ));
    };

    if cfg!(windows) {
        let mut args = vec!["/c".to_string()];
        args.extend(tokens.iter().cloned());
        return Ok(UserCommand {
            program: "cmd".to_string(),
            args,
        });
    }

    if rest.is_empty() {
        return Ok(UserCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), first.clone()],
        });
    }

    Ok(UserCommand {
        program: first.clone(),
        args: rest.to_vec(),
    })
}

/// Runs the user's command with `envs` added to the inherited environment.
///
/// # Errors
///
/// Returns [`Error::Usage`] for an empty command and [`Error::Process`] if
/// the command cannot be started.
#[tracing::instrument(skip(envs))]
pub async fn run_user_command(
    tokens: &[String],
    envs: &[(String, String)],
) -> Result<NormalizedStatus> {
    let command = user_command(tokens)?;
    let status = exec::run_attached(&command.program, &command.args, envs).await?;
    tracing::info!(%status, "User command finished");
    Ok(status)
}

#![cfg(unix)]

mod common;

use async_trait::async_trait;
use common::{
    FAILING_INITDB_PG_CTL, FAILING_START_PG_CTL, FakeBin, LONG_RUNNING_POSTGRES,
    READY_PG_ISREADY, RECORDING_PG_CTL, is_alive,
};
use mockall::mock;
use pgvenv::error::{BootFailure, Error, Result};
use pgvenv::{
    ConnectionDescriptor, NormalizedStatus, PgVenv, PostgresServer, ServerStatus, ServerStrategy,
    VenvConfig,
};
use std::path::PathBuf;

// Define a mock for the PostgresServer trait
mock! {
    pub Server {}

    #[async_trait]
    impl PostgresServer for Server {
        async fn start(&mut self) -> Result<()>;
        async fn stop(&mut self) -> Result<()>;
        fn connection_descriptor(&self) -> ConnectionDescriptor;
        fn status(&self) -> ServerStatus;
    }
}

fn command(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

fn venv_for(bin: &FakeBin, strategy: ServerStrategy) -> PgVenv {
    PgVenv::new(VenvConfig {
        strategy,
        bin_dir: Some(bin.path().to_path_buf()),
        boot_timeout_secs: 5,
        poll_interval_millis: 50,
        stop_timeout_secs: 5,
        ..VenvConfig::default()
    })
}

/// Workspace root recovered from the recorded `initdb --pgdata <dir>` call.
fn workspace_root(calls: &[String]) -> PathBuf {
    let initdb = calls
        .iter()
        .find(|line| line.starts_with("initdb"))
        .expect("initdb was called");
    let data_dir = initdb
        .split_whitespace()
        .skip_while(|token| *token != "--pgdata")
        .nth(1)
        .expect("initdb got a data directory");
    PathBuf::from(data_dir)
        .parent()
        .expect("data directory has a parent")
        .to_path_buf()
}

fn ready_server() -> MockServer {
    let mut server = MockServer::new();
    server.expect_start().times(1).returning(|| Ok(()));
    server
        .expect_connection_descriptor()
        .returning(|| ConnectionDescriptor::new("localhost", 5433, "postgres"));
    server.expect_status().return_const(ServerStatus::Running);
    server
}

#[tokio::test]
async fn test_pg_ctl_run_provisions_and_cleans_up() -> Result<()> {
    let bin = FakeBin::new();
    bin.install("pg_ctl", RECORDING_PG_CTL);
    let venv = venv_for(&bin, ServerStrategy::PgCtl);
    let url_file = bin.path().join("url.txt");

    let status = venv
        .run(&command(&[&format!("echo \"$PGURL\" > {}", url_file.display())]))
        .await?;

    assert_eq!(status, NormalizedStatus::Success);
    let calls = bin.calls();
    assert_eq!(calls.len(), 3, "calls: {:?}", calls);
    assert!(calls[0].starts_with("initdb -o -A trust --pgdata "));
    assert!(calls[1].starts_with("start -w -t 5 -o -i -h localhost -p "));
    assert!(calls[2].starts_with("stop "));
    assert!(calls[2].ends_with("-m fast"));

    let url = std::fs::read_to_string(&url_file).expect("user command wrote the url");
    assert!(url.starts_with("postgresql://localhost:"));
    assert!(url.trim_end().ends_with("/postgres"));

    assert!(!workspace_root(&calls).exists());
    Ok(())
}

#[tokio::test]
async fn test_user_exit_code_is_propagated() -> Result<()> {
    let bin = FakeBin::new();
    bin.install("pg_ctl", RECORDING_PG_CTL);
    let venv = venv_for(&bin, ServerStrategy::PgCtl);

    let status = venv.run(&command(&["sh", "-c", "exit 7"])).await?;

    assert_eq!(status, NormalizedStatus::ExitCode(7));
    assert_eq!(pgvenv::exit_code(&Ok(status)), 7);
    // The server is stopped even though the command failed.
    assert!(bin.calls().last().is_some_and(|line| line.starts_with("stop ")));
    Ok(())
}

#[tokio::test]
async fn test_custom_env_var_and_fixed_port() -> Result<()> {
    let bin = FakeBin::new();
    bin.install("pg_ctl", RECORDING_PG_CTL);
    let venv = PgVenv::new(VenvConfig {
        bin_dir: Some(bin.path().to_path_buf()),
        port: Some(6543),
        database: "app".to_string(),
        env_var: "DATABASE_URL".to_string(),
        ..VenvConfig::default()
    });

    let status = venv
        .run(&command(&[
            "test \"$DATABASE_URL\" = postgresql://localhost:6543/app",
        ]))
        .await?;

    assert_eq!(status, NormalizedStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_initdb_failure_is_environmental() {
    let bin = FakeBin::new();
    bin.install("pg_ctl", FAILING_INITDB_PG_CTL);
    let venv = venv_for(&bin, ServerStrategy::PgCtl);
    let marker = bin.path().join("ran");

    let result = venv
        .run(&command(&[&format!("touch {}", marker.display())]))
        .await;

    match result {
        Err(Error::Environment(message)) => {
            assert!(message.contains("directory is not empty"), "{}", message)
        }
        other => panic!("expected environment error, got {:?}", other),
    }
    assert!(!marker.exists());
    let calls = bin.calls();
    assert_eq!(calls.len(), 1);
    assert!(!workspace_root(&calls).exists());
}

#[tokio::test]
async fn test_boot_failure_skips_user_command() {
    let bin = FakeBin::new();
    bin.install("pg_ctl", FAILING_START_PG_CTL);
    let venv = venv_for(&bin, ServerStrategy::PgCtl);
    let marker = bin.path().join("ran");

    let result = venv
        .run(&command(&[&format!("touch {}", marker.display())]))
        .await;

    assert!(matches!(
        result,
        Err(Error::Boot(BootFailure::TerminatedEarly(_)))
    ));
    assert_eq!(pgvenv::exit_code(&result), pgvenv::error::EXIT_BOOT);
    assert!(!marker.exists());
    assert!(!workspace_root(&bin.calls()).exists());
}

#[tokio::test]
async fn test_raw_strategy_end_to_end() -> Result<()> {
    let bin = FakeBin::new();
    bin.install("pg_ctl", RECORDING_PG_CTL);
    bin.install("postgres", LONG_RUNNING_POSTGRES);
    bin.install("pg_isready", READY_PG_ISREADY);
    let venv = venv_for(&bin, ServerStrategy::Raw);

    let status = venv.run(&command(&["test -n \"$PGURL\""])).await?;

    assert_eq!(status, NormalizedStatus::Success);
    // Only initdb goes through pg_ctl.
    assert_eq!(bin.calls().len(), 1);
    assert!(!bin.read_lines("probe.log").is_empty());
    let pid = bin.postgres_pid().expect("fake postgres was started");
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn test_run_with_server_exports_uri_and_stops() -> Result<()> {
    let venv = PgVenv::new(VenvConfig::default());
    let mut server = ready_server();
    server.expect_stop().times(1).returning(|| Ok(()));

    let status = venv
        .run_with_server(
            &mut server,
            &command(&["test \"$PGURL\" = postgresql://localhost:5433/postgres"]),
        )
        .await?;

    assert_eq!(status, NormalizedStatus::Success);
    Ok(())
}

#[tokio::test]
async fn test_run_with_server_does_not_stop_after_failed_start() {
    let venv = PgVenv::new(VenvConfig::default());
    let mut server = MockServer::new();
    server.expect_start().times(1).returning(|| {
        Err(BootFailure::TimedOut(std::time::Duration::from_secs(60)).into())
    });
    server.expect_stop().times(0);

    let result = venv.run_with_server(&mut server, &command(&["true"])).await;

    assert!(matches!(result, Err(Error::Boot(BootFailure::TimedOut(_)))));
}

#[tokio::test]
async fn test_run_with_server_reports_stop_failure() {
    let venv = PgVenv::new(VenvConfig::default());
    let mut server = ready_server();
    server
        .expect_stop()
        .times(1)
        .returning(|| Err(Error::Stop("server did not exit".to_string())));

    let result = venv.run_with_server(&mut server, &command(&["true"])).await;

    assert!(matches!(result, Err(Error::Stop(_))));
    assert_eq!(pgvenv::exit_code(&result), pgvenv::error::EXIT_INTERNAL);
}

#[tokio::test]
async fn test_run_with_server_stops_when_command_cannot_start() {
    let venv = PgVenv::new(VenvConfig::default());
    let mut server = ready_server();
    server.expect_stop().times(1).returning(|| Ok(()));

    let result = venv
        .run_with_server(
            &mut server,
            &command(&["/nonexistent/pgvenv-user-command", "--flag"]),
        )
        .await;

    assert!(matches!(result, Err(Error::Process(_))));
}

#[tokio::test]
async fn test_empty_command_is_rejected_before_provisioning() {
    let bin = FakeBin::new();
    bin.install("pg_ctl", RECORDING_PG_CTL);
    let venv = venv_for(&bin, ServerStrategy::PgCtl);

    let result = venv.run(&[]).await;

    assert!(matches!(result, Err(Error::Usage(_))));
    assert_eq!(pgvenv::exit_code(&result), pgvenv::error::EXIT_USAGE);
    assert!(bin.calls().is_empty());
}


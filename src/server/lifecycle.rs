use crate::error::BootFailure;
use crate::server::ConnectionDescriptor;
use crate::server::monitor::{ProbeStatus, ReadinessProbe};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

/// Default time a server gets to become ready
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default delay between readiness polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default time a stopping server gets to exit
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing knobs for booting and stopping a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSettings {
    /// Deadline for the boot race
    pub timeout: Duration,
    /// Delay between readiness polls
    pub poll_interval: Duration,
    /// Deadline for a stopping server to exit
    pub stop_timeout: Duration,
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_BOOT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// How a boot race was decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Server accepted connections
    Ready,
    /// Server process exited before it was ready
    TerminatedEarly(String),
    /// Readiness probe failed unexpectedly
    ProbeError(String),
    /// Deadline elapsed first
    TimedOut,
}

impl BootOutcome {
    /// Converts the outcome into a boot result.
    pub fn into_result(self, timeout: Duration) -> Result<(), BootFailure> {
        match self {
            BootOutcome::Ready => Ok(()),
            BootOutcome::TerminatedEarly(cause) => Err(BootFailure::TerminatedEarly(cause)),
            BootOutcome::ProbeError(cause) => Err(BootFailure::ProbeError(cause)),
            BootOutcome::TimedOut => Err(BootFailure::TimedOut(timeout)),
        }
    }
}

/// Aborts the wrapped task when dropped, including when the race itself is
/// cancelled mid-flight.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Polls until the probe reports ready or fails.
///
/// Never returns while the server keeps reporting not-ready; the caller
/// bounds it.
async fn poll_until_ready(
    probe: Arc<dyn ReadinessProbe>,
    descriptor: ConnectionDescriptor,
    interval: Duration,
) -> BootOutcome {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match probe.poll(&descriptor).await {
            ProbeStatus::Ready => {
                tracing::debug!(attempt, "Server accepting connections");
                return BootOutcome::Ready;
            }
            ProbeStatus::NotReady(reason) => {
                tracing::debug!(attempt, ?reason, "Server not ready yet");
            }
            ProbeStatus::Error(detail) => {
                return BootOutcome::ProbeError(format!(
                    "waiting for postgres server {}; detail: {}",
                    descriptor, detail
                ));
            }
        }
        time::sleep(interval).await;
    }
}

/// Races readiness against early termination and the boot deadline.
///
/// The readiness loop runs as a spawned task reporting through a oneshot
/// channel; `terminated` resolves with a description of the exit if the
/// server process dies on its own. Whichever resolves first decides the
/// outcome. The polling task is aborted once the race is decided (or the
/// race is cancelled), so no probe runs after this returns. The caller is
/// responsible for cleanup.
pub async fn race_boot<W>(
    probe: Arc<dyn ReadinessProbe>,
    descriptor: ConnectionDescriptor,
    settings: &BootSettings,
    terminated: W,
) -> BootOutcome
where
    W: Future<Output = String>,
{
    let (ready_tx, ready_rx) = oneshot::channel();
    let interval = settings.poll_interval;
    let _poller = AbortOnDrop(tokio::spawn(async move {
        let outcome = poll_until_ready(probe, descriptor, interval).await;
        // The race may already be decided; nobody listens then.
        let _ = ready_tx.send(outcome);
    }));

    tokio::select! {
        polled = ready_rx => match polled {
            Ok(outcome) => outcome,
            Err(_) => BootOutcome::ProbeError("readiness poller ended without a result".to_string()),
        },
        cause = terminated => BootOutcome::TerminatedEarly(cause),
        _ = time::sleep(settings.timeout) => BootOutcome::TimedOut,
    }
}

//! Bounded teardown of every supervised task and registered session.

use super::registry::SessionRegistry;
use super::supervisor::TaskSupervisor;
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bound applied to each shutdown step
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a shutdown run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Tasks that were asked to cancel
    pub tasks_cancelled: usize,
    /// Task cancellation hit the timeout
    pub tasks_forced: bool,
    /// Sessions that were disconnected
    pub sessions_disconnected: usize,
    /// Disconnects hit the timeout
    pub sessions_forced: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        !self.tasks_forced && !self.sessions_forced
    }
}

pub struct ShutdownOrchestrator {
    timeout: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cancel all tasks, then disconnect all sessions, then clear both.
    ///
    /// Tasks go first because a running pipeline may still be using its
    /// connection. Each step waits at most `timeout`; on expiry the step is
    /// abandoned with a warning and shutdown carries on.
    pub async fn run(
        &self,
        supervisor: &TaskSupervisor,
        registry: &SessionRegistry,
    ) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        let tasks = supervisor.snapshot();
        report.tasks_cancelled = supervisor.cancel_all();
        if !tasks.is_empty() {
            let drain = join_all(tasks.iter().map(|task| task.finished()));
            match tokio::time::timeout(self.timeout, drain).await {
                Ok(_) => info!("All pipeline tasks cancelled"),
                Err(_) => {
                    warn!("Timeout waiting for pipeline tasks, forcing shutdown");
                    report.tasks_forced = true;
                }
            }
        }

        let sessions = registry.snapshot().await;
        report.sessions_disconnected = sessions.len();
        if !sessions.is_empty() {
            let disconnects = sessions.iter().map(|(session_id, entry)| async move {
                if let Err(e) = entry.connection.disconnect().await {
                    warn!("Failed to disconnect session {}: {:#}", session_id, e);
                }
            });
            match tokio::time::timeout(self.timeout, join_all(disconnects)).await {
                Ok(_) => info!("All peer connections cleaned up"),
                Err(_) => {
                    warn!("Timeout waiting for peer connections, forcing shutdown");
                    report.sessions_forced = true;
                }
            }
        }

        let dropped_tasks = supervisor.clear();
        let dropped_sessions = registry.clear().await;
        debug!(
            "Cleared {} tasks and {} sessions",
            dropped_tasks, dropped_sessions
        );

        report
    }
}

impl Default for ShutdownOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time allowed for tasks to drain before they are aborted.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A task to wait for during shutdown.
pub struct TrackedTask {
    /// Name used in logs.
    pub name: &'static str,
    /// The running task.
    pub handle: JoinHandle<()>,
}

impl TrackedTask {
    /// Track `handle` under `name`.
    pub fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }
}

/// Owns the server-wide cancellation token.
///
/// The HTTP listener and the hub coordinator both watch the token; cancelling
/// it stops new connections and closes every live one.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the default drain timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Create a coordinator with a custom drain timeout.
    pub fn with_timeout(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// A clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and wait for `tasks` to finish.
    ///
    /// Tasks still running after the drain timeout are aborted. Returns the
    /// names of the aborted tasks.
    pub async fn graceful_shutdown(&self, tasks: Vec<TrackedTask>) -> Vec<&'static str> {
        self.shutdown();
        info!(
            task_count = tasks.len(),
            timeout_ms = u64::try_from(self.drain_timeout.as_millis()).unwrap_or(u64::MAX),
            "draining tasks"
        );

        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        let waits = tasks.into_iter().map(|mut task| async move {
            match tokio::time::timeout_at(deadline, &mut task.handle).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    warn!(task = task.name, error = %e, "task failed during shutdown");
                    None
                }
                Err(_) => {
                    task.handle.abort();
                    warn!(task = task.name, "task did not stop in time, aborted");
                    Some(task.name)
                }
            }
        });
        let aborted: Vec<&'static str> = join_all(waits).await.into_iter().flatten().collect();
        if aborted.is_empty() {
            info!("shutdown complete");
        }
        aborted
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_cancels_every_token() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        assert!(!coord.is_shutting_down());
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled() && t2.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_tasks_drain() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });
        let aborted = coord
            .graceful_shutdown(vec![TrackedTask::new("listener", handle)])
            .await;
        assert!(aborted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_tasks_are_aborted_by_name() {
        let coord = ShutdownCoordinator::with_timeout(Duration::from_millis(100));
        let token = coord.token();
        let good = tokio::spawn(async move { token.cancelled().await });
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let aborted = coord
            .graceful_shutdown(vec![
                TrackedTask::new("hub", good),
                TrackedTask::new("stuck", stuck),
            ])
            .await;
        assert_eq!(aborted, vec!["stuck"]);
    }
}

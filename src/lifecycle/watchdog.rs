//! Hard deadline for close and start.
//!
//! Cancelling a service is cooperative, so a service that ignores its token
//! could hang forever. The watchdog bounds that: it is armed right before a
//! guarded operation and disarmed right after it. If it is still armed when
//! the deadline passes, the fatal action runs and (by default) the process
//! exits, whatever the operation eventually returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Deadline for a guarded close or start.
pub const FATAL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Action run when a guarded operation misses its deadline.
pub type FatalAction = Arc<dyn Fn(&'static str) + Send + Sync>;

/// Spawns a timer per guarded operation.
#[derive(Clone)]
pub struct Watchdog {
    timeout: Duration,
    on_fatal: FatalAction,
}

impl Watchdog {
    /// Watchdog that terminates the process after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_action(timeout, Arc::new(exit_process))
    }

    /// Watchdog with a custom fatal action.
    pub fn with_action(timeout: Duration, on_fatal: FatalAction) -> Self {
        Self { timeout, on_fatal }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start the timer for `operation`.
    pub fn arm(&self, operation: &'static str) -> WatchdogGuard {
        let token = CancellationToken::new();
        let finished = token.clone();
        let timeout = self.timeout;
        let on_fatal = Arc::clone(&self.on_fatal);

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = finished.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    tracing::error!(
                        operation,
                        timeout_secs = timeout.as_secs_f64(),
                        "Guarded operation missed its deadline"
                    );
                    on_fatal(operation);
                }
            }
        });

        WatchdogGuard { token, handle }
    }

    /// Run `operation` under the watchdog.
    pub async fn guard<F: Future>(&self, operation: &'static str, future: F) -> F::Output {
        let guard = self.arm(operation);
        let output = future.await;
        guard.disarm();
        output
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(FATAL_STOP_TIMEOUT)
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

fn exit_process(operation: &'static str) {
    tracing::error!(operation, "Service hung, terminating process");
    std::process::exit(1);
}

/// An armed watchdog timer. Dropping it disarms the timer.
#[derive(Debug)]
pub struct WatchdogGuard {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl WatchdogGuard {
    /// Mark the guarded operation as finished.
    pub fn disarm(self) {
        self.token.cancel();
    }

    /// Whether the timer task has finished, either disarmed or fired.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for WatchdogGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

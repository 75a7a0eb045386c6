//! Graceful-then-forceful termination of a single process.
//!
//! 1. A process that is already gone yields [`TerminationOutcome::AlreadyGone`].
//! 2. A graceful stop is requested; if the platform cannot deliver one the
//!    terminator skips straight to the forceful kill.
//! 3. Liveness is polled until the grace period elapses.
//! 4. Survivors are killed and polled again for a bounded confirmation window.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::platform::{Delivery, GracefulStop};
use super::{ProcessId, TerminationOutcome};

/// Liveness poll schedule: the interval doubles up to `ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    initial: Duration,
    ceiling: Duration,
}

impl PollBackoff {
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        Self {
            initial,
            ceiling: ceiling.max(initial),
        }
    }

    pub const fn initial(&self) -> Duration {
        self.initial
    }

    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.ceiling)
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1))
    }
}

/// Terminates processes through a [`GracefulStop`] capability.
pub struct Terminator<'a> {
    signals: &'a dyn GracefulStop,
    backoff: PollBackoff,
    force_wait: Duration,
}

impl<'a> Terminator<'a> {
    pub fn new(signals: &'a dyn GracefulStop, backoff: PollBackoff, force_wait: Duration) -> Self {
        Self {
            signals,
            backoff,
            force_wait,
        }
    }

    pub fn signals(&self) -> &'a dyn GracefulStop {
        self.signals
    }

    /// Stop `pid`, escalating to a forceful kill after `grace_period`.
    pub async fn terminate(&self, pid: ProcessId, grace_period: Duration) -> TerminationOutcome {
        if !self.signals.is_alive(pid) {
            debug!(pid, "Process already gone");
            return TerminationOutcome::AlreadyGone;
        }

        match self.signals.request_graceful_stop(pid) {
            Delivery::Delivered => {
                if self.wait_gone(pid, grace_period).await {
                    info!(pid, "Process terminated gracefully");
                    return TerminationOutcome::GracefulExit;
                }
                warn!(
                    pid,
                    grace_secs = grace_period.as_secs_f32(),
                    "Process did not terminate within grace period"
                );
            }
            Delivery::NoSuchProcess => return TerminationOutcome::AlreadyGone,
            Delivery::Unsupported => {
                info!(pid, "Graceful stop not available on this platform, killing directly");
            }
            Delivery::Failed(reason) => {
                warn!(pid, %reason, "Graceful stop request failed, killing directly");
            }
        }

        match self.force(pid).await {
            // Gone between the last poll and the kill.
            TerminationOutcome::AlreadyGone => TerminationOutcome::GracefulExit,
            outcome => outcome,
        }
    }

    /// Forceful kill of `pid`, confirmed within the bounded wait.
    pub async fn force(&self, pid: ProcessId) -> TerminationOutcome {
        warn!(pid, "Killing process forcefully");
        match self.signals.force_kill(pid) {
            Delivery::Delivered => {}
            Delivery::NoSuchProcess => return TerminationOutcome::AlreadyGone,
            Delivery::Unsupported => {
                return TerminationOutcome::TerminationFailed(
                    "forceful kill unsupported on this platform".to_string(),
                );
            }
            Delivery::Failed(reason) => return TerminationOutcome::TerminationFailed(reason),
        }

        if self.wait_gone(pid, self.force_wait).await {
            info!(pid, "Process killed");
            TerminationOutcome::ForcefulExit
        } else {
            TerminationOutcome::TerminationFailed(format!(
                "still alive {:.1}s after forceful kill",
                self.force_wait.as_secs_f32()
            ))
        }
    }

    /// Poll until `pid` is gone or `within` elapses.
    async fn wait_gone(&self, pid: ProcessId, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        let mut interval = self.backoff.initial();
        loop {
            if !self.signals.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = self.backoff.next(interval);
        }
    }
}

//! Interrupt-driven shutdown of the launched child.
//!
//! ```text
//! Running ──exit──────────────────────────────────────────▶ Exited (natural)
//!    │
//!  first interrupt
//!    ▼
//! SignaledGraceful ──exit within grace period─────────────▶ Exited (graceful)
//!    │
//!  grace period elapsed
//!    ▼
//! SignaledForceful ──forceful kill confirmed──────────────▶ Exited (forceful)
//! ```
//!
//! Interrupts after the first are logged and otherwise ignored: escalation is
//! already bounded by the grace period.

use std::process::ExitStatus;
use std::time::Duration;

use tracing::{error, info, warn};

use super::interrupt::Interrupts;
use crate::error::Error;
use crate::process::platform::{Delivery, GracefulStop};
use crate::process::terminator::Terminator;
use crate::process::{ManagedProcessHandle, ProcessId, ProcessLifecycleState, TerminationOutcome};

/// How the child reached its final state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Exited on its own.
    Natural(ExitStatus),
    /// Exited within the grace period after the stop request.
    Graceful,
    /// Killed after the grace period.
    Forceful,
    /// Survived the forceful kill.
    Failed { pid: ProcessId, reason: String },
}

impl ShutdownReport {
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Natural(_) => "natural",
            Self::Graceful => "graceful",
            Self::Forceful => "forceful",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Drives a [`ManagedProcessHandle`] from `Running` to `Exited`.
pub struct ShutdownCoordinator<'a> {
    signals: &'a dyn GracefulStop,
    terminator: Terminator<'a>,
    grace_period: Duration,
    reap_wait: Duration,
}

impl<'a> ShutdownCoordinator<'a> {
    /// `terminator` must wrap the same capability as `signals`.
    pub fn new(terminator: Terminator<'a>, grace_period: Duration) -> Self {
        Self {
            signals: terminator.signals(),
            terminator,
            grace_period,
            reap_wait: Duration::from_secs(2),
        }
    }

    /// Block until the child exits or an interrupt arrives, then see the
    /// child through to `Exited`.
    pub async fn drive(
        &self,
        handle: &mut ManagedProcessHandle,
        interrupts: &mut Interrupts,
    ) -> ShutdownReport {
        let pid = handle.pid();

        tokio::select! {
            status = handle.child_mut().wait() => {
                return match status {
                    Ok(status) => {
                        handle.advance(ProcessLifecycleState::Exited);
                        self.finish(pid, ShutdownReport::Natural(status))
                    }
                    Err(e) => {
                        warn!(pid, error = %e, "Error waiting for bot process");
                        self.escalate(handle).await
                    }
                };
            }
            Some(()) = interrupts.recv() => {}
        }

        info!(pid, "Stopping bot due to keyboard interrupt...");
        handle.advance(ProcessLifecycleState::SignaledGraceful);
        match self.signals.request_graceful_stop(pid) {
            Delivery::Delivered | Delivery::NoSuchProcess => {}
            Delivery::Unsupported => {
                info!(pid, "No graceful stop available on this platform, killing directly");
                return self.escalate(handle).await;
            }
            Delivery::Failed(reason) => {
                warn!(pid, %reason, "Failed to send graceful stop");
                return self.escalate(handle).await;
            }
        }

        let grace = tokio::time::sleep(self.grace_period);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                status = handle.child_mut().wait() => {
                    return match status {
                        Ok(status) => {
                            info!(pid, %status, "Bot exited after graceful stop");
                            handle.advance(ProcessLifecycleState::Exited);
                            self.finish(pid, ShutdownReport::Graceful)
                        }
                        Err(e) => {
                            warn!(pid, error = %e, "Error waiting for bot process");
                            self.escalate(handle).await
                        }
                    };
                }
                () = &mut grace => break,
                Some(()) = interrupts.recv() => {
                    info!(pid, "Shutdown already in progress, ignoring repeated interrupt");
                }
            }
        }

        warn!(
            pid,
            grace_secs = self.grace_period.as_secs_f32(),
            "Bot did not stop within grace period"
        );
        self.escalate(handle).await
    }

    async fn escalate(&self, handle: &mut ManagedProcessHandle) -> ShutdownReport {
        let pid = handle.pid();
        handle.advance(ProcessLifecycleState::SignaledForceful);

        match self.terminator.force(pid).await {
            TerminationOutcome::TerminationFailed(reason) => {
                self.finish(pid, ShutdownReport::Failed { pid, reason })
            }
            _ => {
                match tokio::time::timeout(self.reap_wait, handle.child_mut().wait()).await {
                    Ok(Ok(status)) => info!(pid, %status, "Bot process reaped"),
                    Ok(Err(e)) => warn!(pid, error = %e, "Error reaping bot process"),
                    Err(_) => warn!(pid, "Timed out reaping bot process"),
                }
                handle.advance(ProcessLifecycleState::Exited);
                self.finish(pid, ShutdownReport::Forceful)
            }
        }
    }

    fn finish(&self, pid: ProcessId, report: ShutdownReport) -> ShutdownReport {
        if matches!(report, ShutdownReport::Natural(_) | ShutdownReport::Graceful)
            && self.signals.kill_leftovers(pid) == Delivery::Delivered
        {
            warn!(pid, "Killed processes left behind in the bot's process group");
        }
        match &report {
            ShutdownReport::Failed { reason, .. } => {
                let err = Error::TerminationFailed {
                    pid,
                    reason: reason.clone(),
                };
                error!(pid, "{err}; stop it manually (e.g. `kill -9 {pid}`)");
            }
            ShutdownReport::Natural(status) => {
                info!(pid, path = report.path(), %status, "Bot has been shut down.");
            }
            ShutdownReport::Graceful | ShutdownReport::Forceful => {
                info!(pid, path = report.path(), "Bot has been shut down.");
            }
        }
        report
    }
}

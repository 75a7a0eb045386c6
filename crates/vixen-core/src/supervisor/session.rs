//! One supervised run of the bot: reap, launch, wait, shut down, report.

use std::path::Path;
use std::process::{ExitCode, ExitStatus};
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};

use super::interrupt::Interrupts;
use super::launcher::launch;
use super::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::config::SupervisorSettings;
use crate::error::Result;
use crate::process::platform::GracefulStop;
use crate::process::state_file::{SessionRecord, StateFile};
use crate::process::table::ProcessTable;
use crate::process::terminator::{PollBackoff, Terminator};
use crate::process::{LaunchCommand, MatchQuery, ProcessId, Reaper};

/// Exit code when the child could not be started.
pub const EXIT_LAUNCH_FAILED: u8 = 2;
/// Exit code when the child survived the forceful kill.
pub const EXIT_TERMINATION_FAILED: u8 = 3;

/// Everything a session needs to know about the bot it supervises.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command: LaunchCommand,
    /// Which running processes count as stray instances of the bot.
    pub query: MatchQuery,
    pub grace_period: Duration,
    pub force_wait: Duration,
    pub backoff: PollBackoff,
    pub state_file: StateFile,
}

impl SessionConfig {
    /// Session for `command` in `project_dir`, timed by `settings`.
    ///
    /// A configured reap pattern replaces the built-in one; either way only
    /// processes running in `project_dir` are reaped.
    pub fn new(
        command: LaunchCommand,
        project_dir: &Path,
        settings: &SupervisorSettings,
    ) -> Result<Self> {
        let query = match &settings.reap_pattern {
            Some(pattern) => MatchQuery::regex(pattern)?.in_directory(project_dir),
            None => MatchQuery::managed_bot(project_dir),
        };
        Ok(Self {
            command,
            query,
            grace_period: settings.grace_period(),
            force_wait: settings.force_wait(),
            backoff: settings.backoff(),
            state_file: StateFile::in_project(project_dir),
        })
    }
}

/// How a session ended, as a process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExit {
    code: u8,
    report: Option<ShutdownReport>,
}

impl SessionExit {
    fn launch_failed() -> Self {
        Self {
            code: EXIT_LAUNCH_FAILED,
            report: None,
        }
    }

    /// Stopped by the operator before anything was launched.
    const fn interrupted() -> Self {
        Self {
            code: 0,
            report: None,
        }
    }

    fn from_report(report: ShutdownReport) -> Self {
        let code = match &report {
            ShutdownReport::Natural(status) => status_code(*status),
            ShutdownReport::Graceful | ShutdownReport::Forceful => 0,
            ShutdownReport::Failed { .. } => EXIT_TERMINATION_FAILED,
        };
        Self {
            code,
            report: Some(report),
        }
    }

    pub const fn code(&self) -> u8 {
        self.code
    }

    /// `None` when the child never started, including when the operator
    /// interrupted the session during reaping.
    pub const fn report(&self) -> Option<&ShutdownReport> {
        self.report.as_ref()
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code)
    }
}

/// The child's own exit code, or `128 + signal` when a signal ended it.
fn status_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(1);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(128 + signal).unwrap_or(1);
        }
    }
    1
}

/// Supervises one bot instance from reap to final report.
pub struct Session<'a> {
    table: &'a dyn ProcessTable,
    child_signals: &'a dyn GracefulStop,
    stray_signals: &'a dyn GracefulStop,
}

impl<'a> Session<'a> {
    pub fn new(
        table: &'a dyn ProcessTable,
        child_signals: &'a dyn GracefulStop,
        stray_signals: &'a dyn GracefulStop,
    ) -> Self {
        Self {
            table,
            child_signals,
            stray_signals,
        }
    }

    /// An interrupt that arrives while strays are being reaped ends the
    /// session without launching.
    pub async fn run(&self, config: &SessionConfig, interrupts: &mut Interrupts) -> SessionExit {
        info!("Checking for existing bot processes...");
        let reaped = tokio::select! {
            biased;
            Some(()) = interrupts.recv() => {
                info!("Interrupted before launch, not starting the bot");
                return SessionExit::interrupted();
            }
            reaped = self.reap(config) => reaped,
        };
        if reaped > 0 {
            info!(count = reaped, "Terminated existing bot processes");
        }
        info!("Process environment is clean.");

        let mut handle = match launch(&config.command) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Bot could not be started");
                return SessionExit::launch_failed();
            }
        };

        let mut guard = SessionGuard::new(&config.state_file, self.child_signals, handle.pid());
        let record = SessionRecord::new(
            handle.pid(),
            handle.command().to_string(),
            handle.launched_at(),
        );
        if let Err(e) = config.state_file.save(&record) {
            warn!(error = %e, "Failed to write session record");
        }
        info!("Press Ctrl+C to stop the bot");

        let coordinator = ShutdownCoordinator::new(
            Terminator::new(self.child_signals, config.backoff, config.force_wait),
            config.grace_period,
        );
        let report = coordinator.drive(&mut handle, interrupts).await;
        guard.complete(&report);

        let uptime = SystemTime::now()
            .duration_since(handle.launched_at())
            .unwrap_or_default();
        let exit = SessionExit::from_report(report);
        info!(
            code = exit.code(),
            uptime_secs = uptime.as_secs(),
            state = %handle.state(),
            "Session finished"
        );
        exit
    }

    /// Terminate the previous session's child, then every other stray.
    async fn reap(&self, config: &SessionConfig) -> usize {
        let reaper = Reaper::new(
            self.table,
            Terminator::new(self.stray_signals, config.backoff, config.force_wait),
        );
        reaper
            .reap_recorded(&config.state_file, &config.query, config.grace_period)
            .await
            + reaper.reap_all(&config.query, config.grace_period).await
    }
}

/// Cleans up after the launched child on every way out of [`Session::run`].
///
/// Dropped before the child is confirmed exited, it kills the child's whole
/// group; the child's own `kill_on_drop` only reaches the direct child.
struct SessionGuard<'a> {
    state_file: &'a StateFile,
    signals: &'a dyn GracefulStop,
    pid: ProcessId,
    finished: bool,
}

impl<'a> SessionGuard<'a> {
    fn new(state_file: &'a StateFile, signals: &'a dyn GracefulStop, pid: ProcessId) -> Self {
        Self {
            state_file,
            signals,
            pid,
            finished: false,
        }
    }

    /// A child that survived the kill keeps its record for the next session.
    fn complete(&mut self, report: &ShutdownReport) {
        self.finished = true;
        if matches!(report, ShutdownReport::Failed { .. }) {
            warn!(
                pid = self.pid,
                path = %self.state_file.path().display(),
                "Keeping session record so the next run can reap the survivor"
            );
            return;
        }
        self.clear();
    }

    fn clear(&self) {
        if let Err(e) = self.state_file.clear() {
            warn!(error = %e, "Failed to remove session record");
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(pid = self.pid, "Session ended before the bot exited, killing it");
        let delivery = self.signals.force_kill(self.pid);
        info!(pid = self.pid, ?delivery, "Cleanup kill sent");
        self.clear();
    }
}

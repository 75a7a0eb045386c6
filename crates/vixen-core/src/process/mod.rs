//! Process-table primitives: matching, signalling, termination and reaping.

pub mod matcher;
pub mod platform;
pub mod reaper;
pub mod state_file;
pub mod table;
pub mod terminator;

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use tokio::process::Child;
use tracing::debug;

pub use matcher::{MatchQuery, find_matching};
pub use platform::{Delivery, GracefulStop};
pub use reaper::Reaper;
pub use table::{ProcessEntry, ProcessTable, SystemProcessTable};
pub use terminator::{PollBackoff, Terminator};

/// Platform-assigned process identifier.
pub type ProcessId = u32;

/// Lifecycle of a launched child. Ordering follows the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessLifecycleState {
    Running,
    SignaledGraceful,
    SignaledForceful,
    Exited,
}

impl ProcessLifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::SignaledGraceful => "signaled-graceful",
            Self::SignaledForceful => "signaled-forceful",
            Self::Exited => "exited",
        }
    }
}

impl fmt::Display for ProcessLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of terminating a single process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    GracefulExit,
    ForcefulExit,
    AlreadyGone,
    TerminationFailed(String),
}

impl TerminationOutcome {
    /// Whether the process is confirmed gone.
    pub const fn is_gone(&self) -> bool {
        !matches!(self, Self::TerminationFailed(_))
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GracefulExit => write!(f, "graceful exit"),
            Self::ForcefulExit => write!(f, "forceful exit"),
            Self::AlreadyGone => write!(f, "already gone"),
            Self::TerminationFailed(reason) => write!(f, "termination failed: {reason}"),
        }
    }
}

/// Program, arguments and working directory of the managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>, args: &[&str], working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
            working_dir: working_dir.into(),
        }
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Handle to the one child launched by a session.
///
/// Owned by the session; only the shutdown coordinator moves its state.
#[derive(Debug)]
pub struct ManagedProcessHandle {
    pid: ProcessId,
    command: LaunchCommand,
    launched_at: SystemTime,
    state: ProcessLifecycleState,
    child: Child,
}

impl ManagedProcessHandle {
    pub(crate) fn new(pid: ProcessId, command: LaunchCommand, child: Child) -> Self {
        Self {
            pid,
            command,
            launched_at: SystemTime::now(),
            state: ProcessLifecycleState::Running,
            child,
        }
    }

    pub const fn pid(&self) -> ProcessId {
        self.pid
    }

    pub const fn command(&self) -> &LaunchCommand {
        &self.command
    }

    pub const fn launched_at(&self) -> SystemTime {
        self.launched_at
    }

    pub const fn state(&self) -> ProcessLifecycleState {
        self.state
    }

    pub(crate) const fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns `false` and leaves the state untouched otherwise.
    pub(crate) fn advance(&mut self, next: ProcessLifecycleState) -> bool {
        if next <= self.state {
            debug!(
                pid = self.pid,
                from = %self.state,
                to = %next,
                "Ignoring backwards lifecycle transition"
            );
            return false;
        }
        debug!(pid = self.pid, from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
        true
    }
}

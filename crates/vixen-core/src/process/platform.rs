//! Platform-specific stop requests.
//!
//! Callers never branch on the OS: they hold a [`GracefulStop`] chosen at
//! startup by [`for_process_group`] or [`for_strays`].

use tracing::debug;

use super::ProcessId;
use super::table;

/// What happened when a stop request was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NoSuchProcess,
    /// The platform has no way to express this request.
    Unsupported,
    Failed(String),
}

/// Stop capability for a process identifier.
pub trait GracefulStop: Send + Sync {
    /// Ask the process to exit cleanly.
    fn request_graceful_stop(&self, pid: ProcessId) -> Delivery;

    /// Kill the process unconditionally.
    fn force_kill(&self, pid: ProcessId) -> Delivery;

    /// Whether the process still exists.
    fn is_alive(&self, pid: ProcessId) -> bool {
        table::is_alive(pid)
    }

    /// Kill whatever is left of the process group led by an exited `pid`.
    fn kill_leftovers(&self, _pid: ProcessId) -> Delivery {
        Delivery::Unsupported
    }
}

/// Signals for a child we launched as the leader of its own process group.
#[cfg(unix)]
pub fn for_process_group() -> Box<dyn GracefulStop> {
    Box::new(posix::PosixSignals::group(nix::sys::signal::Signal::SIGINT))
}

/// Signals for processes found by pattern.
#[cfg(unix)]
pub fn for_strays() -> Box<dyn GracefulStop> {
    Box::new(posix::PosixSignals::process(
        nix::sys::signal::Signal::SIGTERM,
    ))
}

#[cfg(not(unix))]
pub fn for_process_group() -> Box<dyn GracefulStop> {
    Box::new(TaskKill)
}

#[cfg(not(unix))]
pub fn for_strays() -> Box<dyn GracefulStop> {
    Box::new(TaskKill)
}

#[cfg(unix)]
pub mod posix {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;
    use tracing::debug;

    use super::{Delivery, GracefulStop};
    use crate::process::ProcessId;

    /// Whether signals target one process or its whole group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Scope {
        Process,
        Group,
    }

    /// POSIX signal delivery via `kill(2)` / `killpg(2)`.
    #[derive(Debug, Clone, Copy)]
    pub struct PosixSignals {
        graceful: Signal,
        scope: Scope,
    }

    impl PosixSignals {
        pub const fn process(graceful: Signal) -> Self {
            Self {
                graceful,
                scope: Scope::Process,
            }
        }

        pub const fn group(graceful: Signal) -> Self {
            Self {
                graceful,
                scope: Scope::Group,
            }
        }

        pub const fn scope(&self) -> Scope {
            self.scope
        }

        fn send(&self, pid: ProcessId, signal: Signal) -> Delivery {
            let Ok(raw) = i32::try_from(pid) else {
                return Delivery::Failed(format!("pid {pid} out of range"));
            };
            let target = Pid::from_raw(raw);
            let result = match self.scope {
                Scope::Process => kill(target, signal),
                Scope::Group => killpg(target, signal),
            };
            match result {
                Ok(()) => {
                    debug!(pid, ?signal, scope = ?self.scope, "Signal sent");
                    Delivery::Delivered
                }
                Err(Errno::ESRCH) => Delivery::NoSuchProcess,
                Err(e) => Delivery::Failed(format!("{signal} to {pid}: {e}")),
            }
        }
    }

    impl GracefulStop for PosixSignals {
        fn request_graceful_stop(&self, pid: ProcessId) -> Delivery {
            self.send(pid, self.graceful)
        }

        fn force_kill(&self, pid: ProcessId) -> Delivery {
            self.send(pid, Signal::SIGKILL)
        }

        // A pgid is not reused while any member lives, so this cannot hit
        // an unrelated group.
        fn kill_leftovers(&self, pid: ProcessId) -> Delivery {
            match self.scope {
                Scope::Group => self.send(pid, Signal::SIGKILL),
                Scope::Process => Delivery::Unsupported,
            }
        }
    }
}

/// Stop requests through `taskkill`, for systems without POSIX signals.
///
/// There is no cooperative request we can deliver to a console process in a
/// separate group, so graceful stops report [`Delivery::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskKill;

impl GracefulStop for TaskKill {
    fn request_graceful_stop(&self, _pid: ProcessId) -> Delivery {
        Delivery::Unsupported
    }

    fn force_kill(&self, pid: ProcessId) -> Delivery {
        let pid_arg = pid.to_string();
        let output = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid_arg])
            .output();
        match output {
            Ok(out) if out.status.success() => {
                debug!(pid, "taskkill succeeded");
                Delivery::Delivered
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                if stderr.contains("not found") {
                    Delivery::NoSuchProcess
                } else {
                    Delivery::Failed(format!("taskkill exited with {}: {}", out.status, stderr.trim()))
                }
            }
            Err(e) => Delivery::Failed(format!("failed to run taskkill: {e}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn taskkill_has_no_graceful_request() {
        assert_eq!(TaskKill.request_graceful_stop(1), Delivery::Unsupported);
    }

    #[cfg(unix)]
    #[test]
    fn signalling_a_missing_pid_reports_no_such_process() {
        // Spawn and reap a child so its pid is known to be free.
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let signals = for_strays();
        assert_eq!(signals.request_graceful_stop(pid), Delivery::NoSuchProcess);
        assert_eq!(signals.force_kill(pid), Delivery::NoSuchProcess);
        assert!(!signals.is_alive(pid));
    }

    #[cfg(unix)]
    #[test]
    fn graceful_request_stops_sleeping_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        assert_eq!(for_strays().request_graceful_stop(pid), Delivery::Delivered);
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}

//! OS process table access backed by `sysinfo`.

use std::path::PathBuf;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

use super::ProcessId;
use crate::error::{Error, Result};

/// One visible process, reduced to what matching needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    pub name: String,
    pub command_line: String,
    /// Working directory, when the platform lets us read it.
    pub cwd: Option<PathBuf>,
}

/// Source of process listings.
pub trait ProcessTable: Send + Sync {
    /// List every live process visible to the caller.
    fn snapshot(&self) -> Result<Vec<ProcessEntry>>;
}

/// The real OS process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(Error::EnumerationFailed(
                "process listing is not supported on this platform".to_string(),
            ));
        }

        let refresh = ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::Always)
            .with_cwd(UpdateKind::Always)
            .with_exe(UpdateKind::OnlyIfNotSet);
        let mut system = System::new();
        let refreshed = system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
        // Our own process is always visible, so an empty listing means the
        // table itself could not be read.
        if refreshed == 0 {
            return Err(Error::EnumerationFailed(
                "process table returned no entries".to_string(),
            ));
        }

        Ok(system
            .processes()
            .iter()
            .filter(|(_, process)| !is_defunct(process.status()))
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                command_line: join_command_line(process.cmd()),
                cwd: process.cwd().map(std::path::Path::to_path_buf),
            })
            .collect())
    }
}

/// Whether `pid` names a live process. Zombies count as gone.
pub fn is_alive(pid: ProcessId) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system
        .process(pid)
        .is_some_and(|process| !is_defunct(process.status()))
}

const fn is_defunct(status: ProcessStatus) -> bool {
    matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}

fn join_command_line(cmd: &[std::ffi::OsString]) -> String {
    let mut line = String::new();
    for arg in cmd {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&arg.to_string_lossy());
    }
    line
}

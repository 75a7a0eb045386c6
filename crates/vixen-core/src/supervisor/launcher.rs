//! Starting the managed child.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::process::{LaunchCommand, ManagedProcessHandle};

/// Windows `CREATE_NEW_PROCESS_GROUP` creation flag.
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Start `command` with the supervisor's stdio.
///
/// The child leads a new process group so a Ctrl+C at the terminal reaches
/// only the supervisor, which then stops the child in order.
pub fn launch(command: &LaunchCommand) -> Result<ManagedProcessHandle> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

    let child = cmd.spawn().map_err(|e| {
        error!(command = %command, error = %e, "Failed to launch process");
        Error::LaunchFailed {
            command: command.to_string(),
            reason: e.to_string(),
        }
    })?;

    let pid = child.id().ok_or_else(|| Error::LaunchFailed {
        command: command.to_string(),
        reason: "spawned child has no pid".to_string(),
    })?;

    info!(
        pid,
        command = %command,
        working_dir = %command.working_dir.display(),
        "Launched bot process"
    );
    Ok(ManagedProcessHandle::new(pid, command.clone(), child))
}

//! Persisted record of the last launched bot process.
//!
//! Written after launch and removed once the child is confirmed exited, so a
//! record that survives means the previous supervisor died mid-session.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProcessId;
use crate::config::PROJECT_STATE_DIR;
use crate::error::Result;

const SESSION_FILENAME: &str = "session.json";

/// What a session records about its child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub pid: ProcessId,
    pub command: String,
    pub started_at_secs: u64,
    pub supervisor_pid: ProcessId,
}

impl SessionRecord {
    pub fn new(pid: ProcessId, command: impl Into<String>, started_at: SystemTime) -> Self {
        Self {
            pid,
            command: command.into(),
            started_at_secs: started_at
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            supervisor_pid: std::process::id(),
        }
    }
}

/// Location of the session record for one project.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn in_project(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(PROJECT_STATE_DIR).join(SESSION_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, `None` when absent.
    pub fn load(&self) -> Result<Option<SessionRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), pid = record.pid, "Session record written");
        Ok(())
    }

    /// Remove the record; a missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

//! Clearing stray bot instances before a new one starts.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::matcher::{MatchQuery, find_matching};
use super::state_file::StateFile;
use super::table::ProcessTable;
use super::terminator::Terminator;
use super::{ProcessId, TerminationOutcome};

/// Finds and terminates processes matching a query, one at a time.
pub struct Reaper<'a> {
    table: &'a dyn ProcessTable,
    terminator: Terminator<'a>,
}

impl<'a> Reaper<'a> {
    pub fn new(table: &'a dyn ProcessTable, terminator: Terminator<'a>) -> Self {
        Self { table, terminator }
    }

    /// Terminate every process matching `query`.
    ///
    /// Returns how many were confirmed gone. Individual failures are logged
    /// and skipped; an unreadable process table counts as no matches.
    pub async fn reap_all(&self, query: &MatchQuery, grace_period: Duration) -> usize {
        let pids = match find_matching(self.table, query) {
            Ok(pids) => pids,
            Err(e) => {
                warn!(error = %e, "Error checking for existing processes");
                return 0;
            }
        };

        if pids.is_empty() {
            debug!(pattern = query.pattern(), "No stray processes found");
            return 0;
        }

        let mut reaped = 0;
        let mut failed: Vec<(ProcessId, String)> = Vec::new();
        for pid in pids {
            warn!(pid, "Killing existing bot process");
            match self.terminator.terminate(pid, grace_period).await {
                TerminationOutcome::TerminationFailed(reason) => failed.push((pid, reason)),
                outcome => {
                    debug!(pid, %outcome, "Stray process cleared");
                    reaped += 1;
                }
            }
        }

        for (pid, reason) in &failed {
            warn!(pid, %reason, "Could not terminate stray process");
        }
        reaped
    }

    /// Terminate the child recorded by a previous session, if it still runs
    /// the managed command, then drop the record.
    pub async fn reap_recorded(
        &self,
        state: &StateFile,
        query: &MatchQuery,
        grace_period: Duration,
    ) -> usize {
        let record = match state.load() {
            Ok(Some(record)) => record,
            Ok(None) => return 0,
            Err(e) => {
                warn!(path = %state.path().display(), error = %e, "Ignoring unreadable session record");
                if let Err(e) = state.clear() {
                    warn!(error = %e, "Failed to remove session record");
                }
                return 0;
            }
        };

        info!(
            pid = record.pid,
            command = %record.command,
            "Found record of a previous session"
        );

        // The pid may have been reused by an unrelated process since.
        let still_ours = find_matching(self.table, query)
            .map(|pids| pids.contains(&record.pid))
            .unwrap_or(false);

        let reaped = if still_ours {
            match self.terminator.terminate(record.pid, grace_period).await {
                TerminationOutcome::TerminationFailed(reason) => {
                    warn!(pid = record.pid, %reason, "Could not terminate previous session's process");
                    0
                }
                TerminationOutcome::AlreadyGone => 0,
                _ => 1,
            }
        } else {
            debug!(pid = record.pid, "Recorded process is no longer running");
            0
        };

        if let Err(e) = state.clear() {
            warn!(error = %e, "Failed to remove session record");
        }
        reaped
    }
}

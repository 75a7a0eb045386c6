//! Locating processes that belong to the managed bot.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::ProcessId;
use super::table::{ProcessEntry, ProcessTable};
use crate::error::Result;

/// Entry points started by `npm run start` / `npm run dev` in the bot project.
const MANAGED_BOT_PATTERN: &str = r"npm(?:\.cmd|-cli\.js)?\s+run\s+(?:start|dev)\b|(?:^|[\s/\\])node(?:\.exe)?\s+(?:\S*[/\\])?dist[/\\]index\.js\b|ts-node\S*\s+(?:\S*[/\\])?src[/\\]index\.ts\b";

#[allow(clippy::expect_used)]
static MANAGED_BOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MANAGED_BOT_PATTERN).expect("static regex is valid"));

/// Pattern over a process' name or command line, optionally pinned to a
/// working directory.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pattern: Regex,
    cwd: Option<PathBuf>,
}

impl MatchQuery {
    /// Match processes whose command line contains `needle` verbatim.
    #[allow(clippy::expect_used)]
    pub fn substring(needle: &str) -> Self {
        Self {
            pattern: Regex::new(&regex::escape(needle)).expect("escaped literal is valid"),
            cwd: None,
        }
    }

    /// Match processes whose name or command line satisfies `pattern`.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            cwd: None,
        })
    }

    /// The bot's own entry points, restricted to `project_dir`.
    pub fn managed_bot(project_dir: &Path) -> Self {
        Self {
            pattern: MANAGED_BOT.clone(),
            cwd: None,
        }
        .in_directory(project_dir)
    }

    /// Only match processes running in `dir`.
    ///
    /// Processes whose working directory cannot be read never match.
    #[must_use]
    pub fn in_directory(mut self, dir: &Path) -> Self {
        self.cwd = Some(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, entry: &ProcessEntry) -> bool {
        let pattern_hit =
            self.pattern.is_match(&entry.command_line) || self.pattern.is_match(&entry.name);
        if !pattern_hit {
            return false;
        }
        match (&self.cwd, &entry.cwd) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Identifiers of every process matching `query`, excluding the caller.
pub fn find_matching(table: &dyn ProcessTable, query: &MatchQuery) -> Result<Vec<ProcessId>> {
    let own_pid = std::process::id();
    let mut pids: Vec<ProcessId> = table
        .snapshot()?
        .iter()
        .filter(|entry| entry.pid != own_pid && query.matches(entry))
        .map(|entry| entry.pid)
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedTable(Vec<ProcessEntry>);

    impl ProcessTable for FixedTable {
        fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTable;

    impl ProcessTable for BrokenTable {
        fn snapshot(&self) -> Result<Vec<ProcessEntry>> {
            Err(Error::EnumerationFailed("permission denied".into()))
        }
    }

    fn entry(pid: ProcessId, command_line: &str, cwd: Option<&str>) -> ProcessEntry {
        ProcessEntry {
            pid,
            name: command_line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            command_line: command_line.to_string(),
            cwd: cwd.map(PathBuf::from),
        }
    }

    #[test]
    fn managed_pattern_matches_bot_entry_points() {
        let query = MatchQuery::regex(MANAGED_BOT_PATTERN).unwrap();
        for line in [
            "npm run start",
            "node /usr/lib/node_modules/npm/bin/npm-cli.js run dev",
            "node /usr/bin/npm run dev",
            "node dist/index.js",
            "/usr/bin/node /srv/bot/dist/index.js",
            "node /srv/bot/node_modules/.bin/ts-node src/index.ts",
            r"C:\Program Files\nodejs\node.exe dist\index.js",
        ] {
            assert!(query.matches(&entry(1, line, None)), "should match: {line}");
        }
    }

    #[test]
    fn managed_pattern_ignores_unrelated_node_processes() {
        let query = MatchQuery::regex(MANAGED_BOT_PATTERN).unwrap();
        for line in [
            "node server.js",
            "node /opt/app/index.js",
            "npm install",
            "vim dist/index.js",
            "code --inspect src/index.ts",
        ] {
            assert!(!query.matches(&entry(1, line, None)), "should not match: {line}");
        }
    }

    #[test]
    fn substring_query_escapes_regex_metacharacters() {
        let query = MatchQuery::substring("bot.js (x)");
        assert!(query.matches(&entry(1, "node bot.js (x)", None)));
        assert!(!query.matches(&entry(1, "node botXjs (x)", None)));
    }

    #[test]
    fn directory_pins_matches() {
        let query = MatchQuery::substring("dist/index.js").in_directory(Path::new("/srv/bot-a"));
        assert!(query.matches(&entry(1, "node dist/index.js", Some("/srv/bot-a"))));
        assert!(!query.matches(&entry(2, "node dist/index.js", Some("/srv/bot-b"))));
    }

    #[test]
    fn unreadable_cwd_is_skipped_when_directory_pinned() {
        let pinned = MatchQuery::substring("dist/index.js").in_directory(Path::new("/srv/bot-a"));
        assert!(!pinned.matches(&entry(3, "node dist/index.js", None)));

        let unpinned = MatchQuery::substring("dist/index.js");
        assert!(unpinned.matches(&entry(3, "node dist/index.js", None)));
    }

    #[test]
    fn find_matching_excludes_own_pid() {
        let own = std::process::id();
        let table = FixedTable(vec![
            entry(own, "vixen-marker", None),
            entry(own.wrapping_add(1), "vixen-marker", None),
        ]);
        let pids = find_matching(&table, &MatchQuery::substring("vixen-marker")).unwrap();
        assert_eq!(pids, vec![own.wrapping_add(1)]);
    }

    #[test]
    fn find_matching_returns_empty_when_nothing_matches() {
        let table = FixedTable(vec![entry(10, "bash", None), entry(11, "sshd", None)]);
        let pids = find_matching(&table, &MatchQuery::substring("dist/index.js")).unwrap();
        assert!(pids.is_empty());
    }

    #[test]
    fn find_matching_surfaces_enumeration_failure() {
        let err = find_matching(&BrokenTable, &MatchQuery::substring("x")).unwrap_err();
        assert!(matches!(err, Error::EnumerationFailed(_)));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(matches!(MatchQuery::regex("(unclosed"), Err(Error::Pattern(_))));
    }
}

//! Locating npm and reading its package listing.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cmd::command_exists;

/// Find the npm executable.
///
/// A configured binary wins when it exists; otherwise `npm` on PATH, and on
/// Windows the standard Node.js install locations and `npm.cmd`.
pub fn find_npm(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() || command_exists(&path.to_string_lossy()) {
            return Some(path.to_path_buf());
        }
        debug!(path = %path.display(), "Configured npm not found, falling back to PATH");
    }

    if command_exists("npm") {
        return Some(PathBuf::from("npm"));
    }

    #[cfg(windows)]
    {
        if let Some(found) = windows_candidates().into_iter().find(|p| p.exists()) {
            return Some(found);
        }
        if command_exists("npm.cmd") {
            return Some(PathBuf::from("npm.cmd"));
        }
    }

    None
}

#[cfg(windows)]
fn windows_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(r"C:\Program Files\nodejs\npm.cmd"),
        PathBuf::from(r"C:\Program Files (x86)\nodejs\npm.cmd"),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(r"AppData\Roaming\npm\npm.cmd"));
    }
    candidates
}

/// Required packages absent from `npm list --depth=0` output.
pub fn missing_packages(listing: &str, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|package| !is_installed(listing, package))
        .cloned()
        .collect()
}

fn is_installed(listing: &str, package: &str) -> bool {
    let needle = format!("{package}@");
    listing.lines().any(|line| {
        let unmet = line.contains("UNMET") || line.trim_end().ends_with("missing");
        !unmet
            && line
                .split_whitespace()
                .any(|token| token.starts_with(&needle))
    })
}

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

fn command_line(program: &Path, args: &[&str]) -> String {
    format!("{} {}", program.display(), args.join(" "))
}

/// Execute a command in `dir` with logging. Logs the full command line at
/// debug level and a human-friendly description at info level.
pub fn run_cmd(description: &str, program: &Path, args: &[&str], dir: &Path) -> Result<()> {
    let cmd_line = command_line(program, args);
    tracing::info!("{description}");
    tracing::debug!("exec: {cmd_line}");

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to execute: {cmd_line}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("command failed: {cmd_line}\nstderr: {stderr}");
        bail!("{description} failed (exit {}): {}", output.status, stderr.trim());
    }
    Ok(())
}

/// Execute a command in `dir` and return its stdout, whatever its exit status.
pub fn run_cmd_output(program: &Path, args: &[&str], dir: &Path) -> Result<String> {
    let cmd_line = command_line(program, args);
    tracing::debug!("exec (capture): {cmd_line}");

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to execute: {cmd_line}"))?;

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check whether a program exists on PATH.
pub fn command_exists(program: &str) -> bool {
    #[cfg(windows)]
    const LOOKUP: &str = "where";
    #[cfg(not(windows))]
    const LOOKUP: &str = "which";

    Command::new(LOOKUP)
        .arg(program)
        .output()
        .is_ok_and(|o| o.status.success())
}

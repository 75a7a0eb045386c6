//! Error types for `Vixen` core library.

use thiserror::Error;

use crate::process::ProcessId;

/// Result type alias using `Vixen` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `Vixen` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration artifacts are absent or still hold placeholders
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    /// Runtime tooling or packages are not installed
    #[error("Dependency missing: {0}")]
    DependencyMissing(String),

    /// Compilation of the bot sources failed
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// The managed process could not be started
    #[error("Failed to launch `{command}`: {reason}")]
    LaunchFailed { command: String, reason: String },

    /// The OS process listing could not be read
    #[error("Failed to enumerate processes: {0}")]
    EnumerationFailed(String),

    /// A process survived the forceful kill
    #[error("Process {pid} could not be terminated: {reason}")]
    TerminationFailed { pid: ProcessId, reason: String },

    /// Invalid process match pattern
    #[error("Invalid process pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Settings error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

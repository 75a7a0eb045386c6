//! `Vixen` Core Library
//!
//! Shared functionality for the `vixen` bot manager:
//! - Process lifecycle supervision (reap, launch, interrupt-driven shutdown)
//! - Settings resolution and hierarchy
//! - Common error types and tracing setup

pub mod config;
pub mod error;
pub mod process;
pub mod supervisor;
pub mod tracing_init;

pub use config::Settings;
pub use error::{Error, Result};
pub use process::{ManagedProcessHandle, ProcessId, ProcessLifecycleState, TerminationOutcome};
pub use supervisor::{Session, SessionConfig, SessionExit};

//! The manager's commands and the collaborators they drive.

use clap::Subcommand;
use tracing::{error, info, warn};

use vixen_core::Result;
use vixen_core::process::LaunchCommand;

/// Which npm script runs the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `npm run start`: the compiled bot.
    Production,
    /// `npm run dev`: straight from the TypeScript sources.
    Development,
}

impl RunMode {
    pub const fn script(self) -> &'static str {
        match self {
            Self::Production => "start",
            Self::Development => "dev",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

/// Project checks and npm operations.
pub trait Toolchain {
    fn npm_available(&self) -> bool;

    /// Create missing project files; fail while `.env` is absent or unfilled.
    fn ensure_config_files(&self) -> Result<()>;

    /// Install required packages that are not yet installed.
    fn ensure_dependencies(&self) -> Result<()>;

    fn build(&self) -> Result<()>;

    /// Remove build output and installed packages. Removal errors are logged.
    fn clean(&self) -> Result<()>;

    fn launch_command(&self, mode: RunMode) -> Result<LaunchCommand>;
}

/// Runs the bot under supervision until it exits, returning the exit code.
pub trait Supervise {
    fn supervise(&self, command: LaunchCommand) -> anyhow::Result<u8>;
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Initialize/check all required files and dependencies
    Init,
    /// Only build the TypeScript code
    Build {
        /// Force clean before building
        #[arg(long)]
        force_clean: bool,
    },
    /// Build and run the bot
    Start {
        /// Skip building
        #[arg(long)]
        skip_build: bool,
        /// Force clean before building
        #[arg(long)]
        force_clean: bool,
    },
    /// Run in development mode (ts-node)
    Dev,
    /// Remove build artifacts and installed packages
    Clean,
}

impl Command {
    const fn needs_npm(&self) -> bool {
        !matches!(self, Self::Init | Self::Clean)
    }
}

/// Run `command`, returning the process exit code.
pub fn execute(command: &Command, toolchain: &dyn Toolchain, supervisor: &dyn Supervise) -> u8 {
    if command.needs_npm() && !toolchain.npm_available() {
        error!("npm not found. Please install Node.js and npm.");
        return 1;
    }

    let result = match command {
        Command::Init => init(toolchain),
        Command::Clean => toolchain.clean().map(|()| 0).map_err(Into::into),
        Command::Build { force_clean } => prepare(toolchain, *force_clean, true).map(|()| 0),
        Command::Start {
            skip_build,
            force_clean,
        } => prepare(toolchain, *force_clean, !*skip_build)
            .and_then(|()| run(toolchain, supervisor, RunMode::Production)),
        Command::Dev => prepare(toolchain, false, false)
            .and_then(|()| run(toolchain, supervisor, RunMode::Development)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    }
}

fn init(toolchain: &dyn Toolchain) -> anyhow::Result<u8> {
    toolchain.ensure_config_files()?;
    info!("All configuration files are present.");

    if toolchain.npm_available() {
        toolchain.ensure_dependencies()?;
    } else {
        warn!("npm not found. Please install Node.js and npm to complete initialization.");
    }
    Ok(0)
}

/// Checks, optional clean, then optional build.
///
/// Dependencies are checked after cleaning so a forced clean does not leave
/// the build without `node_modules`.
fn prepare(toolchain: &dyn Toolchain, force_clean: bool, build: bool) -> anyhow::Result<()> {
    toolchain.ensure_config_files()?;
    if force_clean {
        toolchain.clean()?;
    }
    toolchain.ensure_dependencies()?;
    if build {
        toolchain.build()?;
    }
    Ok(())
}

fn run(toolchain: &dyn Toolchain, supervisor: &dyn Supervise, mode: RunMode) -> anyhow::Result<u8> {
    let command = toolchain.launch_command(mode)?;
    info!("Starting bot in {} mode...", mode.label());
    supervisor.supervise(command)
}

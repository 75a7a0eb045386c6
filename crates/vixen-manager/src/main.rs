//! The Vixen - Discord Bot Manager
//!
//! Sets up, builds and runs the bot, keeping exactly one instance alive.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

use vixen_core::config::load_settings;
use vixen_core::tracing_init::init_tracing;
use vixen_manager::commands::{Command, execute};
use vixen_manager::project::BotProject;
use vixen_manager::supervise::BotSupervisor;

#[derive(Debug, Parser)]
#[command(name = "vixen", version, about = "The Vixen - Discord Bot Manager")]
struct Cli {
    /// Bot project directory (defaults to the current directory)
    #[arg(long, global = true, env = "VIXEN_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Seconds to wait for the bot to stop before killing it
    #[arg(long, global = true)]
    grace_period: Option<u64>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, global = true, default_value = "info", env = "VIXEN_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, global = true, env = "VIXEN_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version requests are "errors" printed to stdout.
        Err(e) => {
            let code = u8::from(e.use_stderr());
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let Some(command) = cli.command.clone() else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    init_tracing(&cli.log_level, cli.log_json);
    info!("The Vixen - Discord Bot Manager");

    match run(&cli, &command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, command: &Command) -> anyhow::Result<u8> {
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let mut settings = load_settings(Some(project_dir.as_path()))?;
    if let Some(secs) = cli.grace_period {
        settings.supervisor.grace_period_secs = secs;
    }

    let project = BotProject::discover(&project_dir, &settings.npm);
    let supervisor = BotSupervisor::new(&project_dir, settings.supervisor);
    Ok(execute(command, &project, &supervisor))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn start_accepts_both_flags() {
        let cli = Cli::try_parse_from(["vixen", "start", "--skip-build", "--force-clean"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Start {
                skip_build: true,
                force_clean: true,
            })
        );
    }

    #[test]
    fn global_flags_follow_the_command() {
        let cli =
            Cli::try_parse_from(["vixen", "dev", "--grace-period", "9", "--project-dir", "/srv/bot"])
                .unwrap();
        assert_eq!(cli.command, Some(Command::Dev));
        assert_eq!(cli.grace_period, Some(9));
        assert_eq!(cli.project_dir, Some(PathBuf::from("/srv/bot")));
    }

    #[test]
    fn no_arguments_parse_without_command() {
        let cli = Cli::try_parse_from(["vixen"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn help_command_is_a_stdout_request() {
        let err = Cli::try_parse_from(["vixen", "help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }

    #[test]
    fn unknown_command_is_an_error() {
        let err = Cli::try_parse_from(["vixen", "deploy"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        assert!(err.use_stderr());
    }
}

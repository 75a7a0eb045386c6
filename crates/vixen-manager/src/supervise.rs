//! Supervised runs of the bot on a tokio runtime.

use std::path::PathBuf;

use anyhow::Context;

use vixen_core::config::SupervisorSettings;
use vixen_core::process::platform::{for_process_group, for_strays};
use vixen_core::process::{LaunchCommand, SystemProcessTable};
use vixen_core::supervisor::interrupt;
use vixen_core::{Session, SessionConfig};

use crate::commands::Supervise;

/// Supervises the bot against the real process table and signals.
#[derive(Debug, Clone)]
pub struct BotSupervisor {
    project_dir: PathBuf,
    settings: SupervisorSettings,
}

impl BotSupervisor {
    pub fn new(project_dir: impl Into<PathBuf>, settings: SupervisorSettings) -> Self {
        Self {
            project_dir: project_dir.into(),
            settings,
        }
    }
}

impl Supervise for BotSupervisor {
    fn supervise(&self, command: LaunchCommand) -> anyhow::Result<u8> {
        let config = SessionConfig::new(command, &self.project_dir, &self.settings)
            .context("invalid supervisor settings")?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let exit = runtime.block_on(async {
            let (mut interrupts, listener) = interrupt::listen();
            let table = SystemProcessTable;
            let child_signals = for_process_group();
            let stray_signals = for_strays();

            let exit = Session::new(&table, child_signals.as_ref(), stray_signals.as_ref())
                .run(&config, &mut interrupts)
                .await;
            listener.abort();
            exit
        });
        Ok(exit.code())
    }
}

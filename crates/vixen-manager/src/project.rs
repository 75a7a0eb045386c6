//! The bot's npm project on disk.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use vixen_core::config::NpmSettings;
use vixen_core::process::LaunchCommand;
use vixen_core::{Error, Result};

use crate::cmd::{run_cmd, run_cmd_output};
use crate::commands::{RunMode, Toolchain};
use crate::npm::{find_npm, missing_packages};
use crate::templates;

/// Directories removed by `clean`, in order.
const CLEAN_DIRS: [&str; 2] = ["dist", "node_modules"];

/// A TypeScript bot project managed through npm.
#[derive(Debug, Clone)]
pub struct BotProject {
    dir: PathBuf,
    npm: Option<PathBuf>,
    required_packages: Vec<String>,
}

impl BotProject {
    /// Project at `dir`, locating npm per `settings`.
    pub fn discover(dir: impl Into<PathBuf>, settings: &NpmSettings) -> Self {
        let npm = find_npm(settings.binary.as_deref());
        Self::with_npm(dir, npm, settings.required_packages.clone())
    }

    pub fn with_npm(
        dir: impl Into<PathBuf>,
        npm: Option<PathBuf>,
        required_packages: Vec<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            npm,
            required_packages,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn npm(&self) -> Result<&Path> {
        self.npm.as_deref().ok_or_else(|| {
            Error::DependencyMissing("npm not found. Please install Node.js and npm.".to_string())
        })
    }

    /// Write `contents` to `name` unless the file exists. Returns whether it
    /// was created.
    fn write_if_missing(&self, name: &str, contents: &str) -> Result<bool> {
        let path = self.dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Toolchain for BotProject {
    fn npm_available(&self) -> bool {
        self.npm.is_some()
    }

    fn ensure_config_files(&self) -> Result<()> {
        for (name, template) in [
            ("package.json", templates::PACKAGE_JSON),
            ("tsconfig.json", templates::TSCONFIG_JSON),
        ] {
            if self.write_if_missing(name, template)? {
                warn!("{name} not found, created a basic one");
            }
        }

        if self.write_if_missing(".env", templates::ENV_FILE)? {
            return Err(Error::ConfigMissing(
                ".env not found; created a template. Please fill in your Discord token and client ID"
                    .to_string(),
            ));
        }

        let env = std::fs::read_to_string(self.dir.join(".env"))?;
        let unfilled = templates::unfilled_placeholders(&env);
        if !unfilled.is_empty() {
            return Err(Error::ConfigMissing(format!(
                "You need to set your Discord token and client ID in the .env file (found {})",
                unfilled.join(", ")
            )));
        }
        Ok(())
    }

    fn ensure_dependencies(&self) -> Result<()> {
        let npm = self.npm()?;
        info!(npm = %npm.display(), "Using npm command");

        let listing = run_cmd_output(npm, &["list", "--depth=0"], &self.dir)
            .map_err(|e| Error::DependencyMissing(format!("{e:#}")))?;
        let missing = missing_packages(&listing, &self.required_packages);
        if missing.is_empty() {
            debug!("All required npm packages are installed");
            return Ok(());
        }

        warn!(packages = %missing.join(", "), "Missing required npm packages");
        let mut args = vec!["install"];
        args.extend(missing.iter().map(String::as_str));
        run_cmd("Installing missing packages...", npm, &args, &self.dir)
            .map_err(|e| Error::DependencyMissing(format!("{e:#}")))?;
        info!("Packages installed successfully!");
        Ok(())
    }

    fn build(&self) -> Result<()> {
        let npm = self.npm()?;
        run_cmd("Building TypeScript code...", npm, &["run", "build"], &self.dir)
            .map_err(|e| Error::BuildFailed(format!("{e:#}")))?;
        info!("Build successful!");
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        info!("Cleaning project...");
        for name in CLEAN_DIRS {
            let path = self.dir.join(name);
            if !path.exists() {
                continue;
            }
            if name == "node_modules" {
                info!("Removing node_modules (this may take a moment)...");
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => info!("Removed {name} directory"),
                Err(e) => error!(path = %path.display(), error = %e, "Error removing {name}"),
            }
        }
        info!("Clean complete!");
        Ok(())
    }

    fn launch_command(&self, mode: RunMode) -> Result<LaunchCommand> {
        Ok(LaunchCommand::new(
            self.npm()?,
            &["run", mode.script()],
            &self.dir,
        ))
    }
}

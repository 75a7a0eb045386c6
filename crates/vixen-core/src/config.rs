//! Settings resolution for `Vixen`.
//!
//! Implements hierarchical settings resolution:
//! 1. Built-in defaults
//! 2. Global settings (~/.config/vixen/settings.json)
//! 3. Project settings (<project>/.vixen/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (applied by the caller, highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::process::terminator::PollBackoff;

/// Directory under the project root holding per-project state and settings.
pub const PROJECT_STATE_DIR: &str = ".vixen";

/// Complete `Vixen` settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub npm: NpmSettings,
}

/// Process supervision timings and matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Seconds between the graceful stop request and escalation.
    pub grace_period_secs: u64,
    /// Seconds to wait for confirmation after a forceful kill.
    pub force_wait_secs: u64,
    /// First liveness poll interval (milliseconds).
    pub poll_initial_ms: u64,
    /// Liveness poll interval ceiling (milliseconds).
    pub poll_ceiling_ms: u64,
    /// Regex replacing the built-in stray-process pattern.
    pub reap_pattern: Option<String>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: 5,
            force_wait_secs: 2,
            poll_initial_ms: 100,
            poll_ceiling_ms: 1000,
            reap_pattern: None,
        }
    }
}

impl SupervisorSettings {
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub const fn force_wait(&self) -> Duration {
        Duration::from_secs(self.force_wait_secs)
    }

    pub fn backoff(&self) -> PollBackoff {
        PollBackoff::new(
            Duration::from_millis(self.poll_initial_ms.max(1)),
            Duration::from_millis(self.poll_ceiling_ms.max(self.poll_initial_ms).max(1)),
        )
    }
}

/// npm tooling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NpmSettings {
    /// Explicit npm executable; PATH lookup when unset.
    pub binary: Option<PathBuf>,
    /// Packages that must appear in `npm list --depth=0`.
    pub required_packages: Vec<String>,
}

impl Default for NpmSettings {
    fn default() -> Self {
        Self {
            binary: None,
            required_packages: ["discord.js", "dotenv", "typescript", "ts-node"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Load settings with hierarchical resolution.
pub fn load_settings(project_dir: Option<&Path>) -> Result<Settings> {
    let files = global_settings_path()
        .into_iter()
        .chain(project_dir.map(project_settings_path));
    let mut settings = resolve_files(files)?;

    apply_env_overrides(&mut settings);

    Ok(settings)
}

/// Defaults overlaid by each existing file in turn, lowest priority first.
fn resolve_files(files: impl IntoIterator<Item = PathBuf>) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in files {
        if path.exists() {
            let layer = load_settings_file(&path)?;
            merge_settings(&mut settings, layer);
        }
    }
    Ok(settings)
}

/// Path of the project-level settings file.
pub fn project_settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_STATE_DIR).join("settings.json")
}

/// Get the global settings file path.
pub fn global_settings_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".vixen").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/vixen/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("vixen").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// One settings file. Only the keys it sets take part in merging.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsLayer {
    supervisor: SupervisorLayer,
    npm: NpmLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SupervisorLayer {
    grace_period_secs: Option<u64>,
    force_wait_secs: Option<u64>,
    poll_initial_ms: Option<u64>,
    poll_ceiling_ms: Option<u64>,
    reap_pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NpmLayer {
    binary: Option<PathBuf>,
    required_packages: Option<Vec<String>>,
}

fn load_settings_file(path: &Path) -> Result<SettingsLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read settings file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse settings file {}: {}",
            path.display(),
            e
        ))
    })
}

fn merge_settings(base: &mut Settings, overlay: SettingsLayer) {
    let supervisor = overlay.supervisor;
    let target = &mut base.supervisor;
    if let Some(secs) = supervisor.grace_period_secs {
        target.grace_period_secs = secs;
    }
    if let Some(secs) = supervisor.force_wait_secs {
        target.force_wait_secs = secs;
    }
    if let Some(ms) = supervisor.poll_initial_ms {
        target.poll_initial_ms = ms;
    }
    if let Some(ms) = supervisor.poll_ceiling_ms {
        target.poll_ceiling_ms = ms;
    }
    if supervisor.reap_pattern.is_some() {
        target.reap_pattern = supervisor.reap_pattern;
    }

    if overlay.npm.binary.is_some() {
        base.npm.binary = overlay.npm.binary;
    }
    if let Some(packages) = overlay.npm.required_packages {
        base.npm.required_packages = packages;
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("VIXEN_GRACE_PERIOD")
        && let Ok(secs) = val.parse()
    {
        settings.supervisor.grace_period_secs = secs;
    }
    if let Ok(val) = std::env::var("VIXEN_NPM")
        && !val.is_empty()
    {
        settings.npm.binary = Some(PathBuf::from(val));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_period_is_5s() {
        let settings = Settings::default();
        assert_eq!(settings.supervisor.grace_period(), Duration::from_secs(5));
        assert_eq!(settings.supervisor.force_wait(), Duration::from_secs(2));
    }

    #[test]
    fn default_required_packages_cover_bot_toolchain() {
        let settings = Settings::default();
        assert_eq!(
            settings.npm.required_packages,
            vec!["discord.js", "dotenv", "typescript", "ts-node"]
        );
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = project_settings_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"supervisor": {"grace_period_secs": 9, "reap_pattern": "node bot\\.js"}}"#,
        )
        .unwrap();

        let project = load_settings_file(&path).unwrap();
        let mut settings = Settings::default();
        merge_settings(&mut settings, project);

        assert_eq!(settings.supervisor.grace_period_secs, 9);
        assert_eq!(settings.supervisor.force_wait_secs, 2);
        assert_eq!(
            settings.supervisor.reap_pattern.as_deref(),
            Some(r"node bot\.js")
        );
        assert_eq!(settings.npm.required_packages.len(), 4);
    }

    #[test]
    fn project_layer_keeps_global_values_it_does_not_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(
            &global,
            r#"{"supervisor": {"grace_period_secs": 20, "poll_ceiling_ms": 500}}"#,
        )
        .unwrap();
        let project = project_settings_path(dir.path());
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();
        std::fs::write(&project, r#"{"npm": {"binary": "/opt/node/bin/npm"}}"#).unwrap();

        let settings = resolve_files([global, project]).unwrap();

        assert_eq!(settings.supervisor.grace_period_secs, 20);
        assert_eq!(settings.supervisor.poll_ceiling_ms, 500);
        assert_eq!(settings.supervisor.force_wait_secs, 2);
        assert_eq!(
            settings.npm.binary.as_deref(),
            Some(Path::new("/opt/node/bin/npm"))
        );
        assert_eq!(settings.npm.required_packages.len(), 4);
    }

    #[test]
    fn later_layer_overrides_earlier_one() {
        let dir = tempfile::TempDir::new().unwrap();
        let global = dir.path().join("global.json");
        let project = dir.path().join("project.json");
        std::fs::write(&global, r#"{"supervisor": {"grace_period_secs": 20}}"#).unwrap();
        std::fs::write(
            &project,
            r#"{"supervisor": {"grace_period_secs": 8}, "npm": {"required_packages": ["dotenv"]}}"#,
        )
        .unwrap();

        let settings = resolve_files([global, project, dir.path().join("absent.json")]).unwrap();

        assert_eq!(settings.supervisor.grace_period_secs, 8);
        assert_eq!(settings.npm.required_packages, vec!["dotenv"]);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_settings_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn backoff_ceiling_never_below_initial() {
        let settings = SupervisorSettings {
            poll_initial_ms: 500,
            poll_ceiling_ms: 100,
            ..SupervisorSettings::default()
        };
        let backoff = settings.backoff();
        assert_eq!(backoff.initial(), Duration::from_millis(500));
        assert_eq!(backoff.ceiling(), Duration::from_millis(500));
    }
}

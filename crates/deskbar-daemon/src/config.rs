//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use deskbar_core::{Height, HeightRange, Preset};
use deskbar_runner::ControllerArgs;
use deskbar_scheduler::SerializerSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Desk controller settings
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Polling and debounce timing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Sit and stand buttons
    #[serde(default)]
    pub presets: PresetsConfig,
    /// Slider bounds
    #[serde(default)]
    pub range: RangeConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_format: LogFormat::default() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Desk controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Path to the controller executable
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Arguments for a move; `{height}` is replaced with the target in cm
    #[serde(default = "default_move_args")]
    pub move_args: Vec<String>,
    /// Arguments for a height query
    #[serde(default = "default_query_args")]
    pub query_args: Vec<String>,
    /// Per-invocation time limit
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            move_args: default_move_args(),
            query_args: default_query_args(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn args(&self) -> ControllerArgs {
        ControllerArgs { move_args: self.move_args.clone(), query_args: self.query_args.clone() }
    }
}

fn default_executable() -> PathBuf {
    PathBuf::from("/opt/homebrew/bin/desk-controller")
}

fn default_move_args() -> Vec<String> {
    ControllerArgs::default().move_args
}

fn default_query_args() -> Vec<String> {
    ControllerArgs::default().query_args
}

fn default_timeout_ms() -> u64 {
    15_000
}

/// Polling and debounce timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Seconds between background height queries
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Quiet period before a slider move is sent
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { poll_interval_secs: default_poll_interval_secs(), debounce_ms: default_debounce_ms() }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    400
}

/// Preset heights in centimetres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetsConfig {
    #[serde(default = "default_sit_cm")]
    pub sit_cm: u32,
    #[serde(default = "default_stand_cm")]
    pub stand_cm: u32,
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self { sit_cm: default_sit_cm(), stand_cm: default_stand_cm() }
    }
}

impl PresetsConfig {
    /// Height for a preset button.
    #[must_use]
    pub fn height(&self, preset: Preset) -> Height {
        match preset {
            Preset::Sit => Height::from_cm(self.sit_cm),
            Preset::Stand => Height::from_cm(self.stand_cm),
        }
    }
}

fn default_sit_cm() -> u32 {
    75
}

fn default_stand_cm() -> u32 {
    120
}

/// Slider bounds in centimetres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeConfig {
    #[serde(default = "default_min_cm")]
    pub min_cm: u32,
    #[serde(default = "default_max_cm")]
    pub max_cm: u32,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self { min_cm: default_min_cm(), max_cm: default_max_cm() }
    }
}

fn default_min_cm() -> u32 {
    50
}

fn default_max_cm() -> u32 {
    250
}

impl Config {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.timing.poll_interval_secs > 0, "timing.poll_interval_secs must be positive");
        ensure!(self.timing.debounce_ms > 0, "timing.debounce_ms must be positive");
        ensure!(
            self.timing.debounce() < self.timing.poll_interval(),
            "timing.debounce_ms ({}ms) must be shorter than timing.poll_interval_secs ({}s)",
            self.timing.debounce_ms,
            self.timing.poll_interval_secs
        );
        ensure!(self.controller.timeout_ms > 0, "controller.timeout_ms must be positive");
        self.controller.args().validate().context("controller.move_args")?;

        let range = self.height_range()?;
        ensure!(
            range.min().is_plausible() && range.max().is_plausible(),
            "range {}..={} is outside what a desk controller can report",
            range.min(),
            range.max()
        );
        for (preset, cm) in [(Preset::Sit, self.presets.sit_cm), (Preset::Stand, self.presets.stand_cm)] {
            let height = Height::try_from_cm(cm).with_context(|| format!("{preset:?} preset"))?;
            if !range.contains(height) {
                bail!(
                    "{preset:?} preset {height} is outside the range {}..={}",
                    range.min(),
                    range.max()
                );
            }
        }
        Ok(())
    }

    /// Slider bounds as a validated range.
    ///
    /// # Errors
    /// Returns an error if a bound does not fit or `min_cm` is not below `max_cm`.
    pub fn height_range(&self) -> Result<HeightRange> {
        let min = Height::try_from_cm(self.range.min_cm).context("range.min_cm")?;
        let max = Height::try_from_cm(self.range.max_cm).context("range.max_cm")?;
        HeightRange::new(min, max).context("range")
    }

    /// Settings for the command serializer.
    #[must_use]
    pub fn serializer_settings(&self) -> SerializerSettings {
        SerializerSettings {
            debounce: self.timing.debounce(),
            command_timeout: Duration::from_millis(self.controller.timeout_ms),
            args: self.controller.args(),
        }
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file at the default location yields the defaults; an explicitly
/// requested file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => {
            ensure!(path.exists(), "Config file not found: {path:?}");
            path.to_path_buf()
        }
        None => config_path()?,
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        info!(?config_path, "Configuration loaded");
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "deskbar", "Deskbar")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

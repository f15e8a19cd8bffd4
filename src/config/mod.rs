//! Runtime settings
//!
//! Sources, lowest precedence first: built-in defaults, `formloom.toml`
//! (optional), `FORMLOOM_` environment variables (`__` separates
//! sections, e.g. `FORMLOOM_FORM__MODE=onBlur`), CLI flags.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::engine::store::ValidationMode;

pub mod validator;

pub use validator::{SettingsError, SettingsValidator};

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "formloom.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub form: FormSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Validation schedule for stores built by the CLI
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FormSettings {
    #[serde(default)]
    pub mode: ValidationMode,
    /// Schedule after the first submit attempt
    #[serde(default)]
    pub revalidate_mode: ValidationMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the file backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/forms")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_path(DEFAULT_CONFIG_FILE)
    }

    /// Load from a config file (missing is fine) plus the environment
    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let settings = Self::load(config_path.as_ref())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load(&cli.config)?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    fn load(config_path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .set_default("form.mode", "onChange")?
            .set_default("form.revalidate_mode", "onChange")?
            .set_default("logging.level", "info")?
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("FORMLOOM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        tracing::debug!("Loaded settings from {}", config_path.display());
        Ok(settings)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(mode) = cli.mode {
            self.form.mode = mode;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        SettingsValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    /// Configured log level; validation guarantees it parses
    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

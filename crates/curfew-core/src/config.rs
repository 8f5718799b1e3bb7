//! Configuration model and helpers used by Curfew binaries.
//!
//! The restriction key and sentinel are compile-time constants and deliberately
//! absent here; the file only tunes the commitment text, the window, and logging.

use crate::error::{CurfewError, CurfewResult};
use crate::logging;
use crate::matcher::{sanitize, MAX_RAW_INPUT_CHARS};
use directories_next::ProjectDirs;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_SENTENCE: &str = "I will put my computer to sleep at 23:15 every night.";
pub const CONFIG_ENV: &str = "CURFEW_CONFIG";
/// Set to `1` to run the blocking window against the in-memory store.
pub const DRY_RUN_ENV: &str = "CURFEW_DRY_RUN";
const CONFIG_FILE_NAME: &str = "curfew.toml";
const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "Curfew";
const APP_NAME: &str = "curfew";
const FONT_SIZE_RANGE: std::ops::RangeInclusive<u16> = 10..=96;

/// The sentence the operator has to type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommitmentCfg {
    #[serde(default = "default_sentence")]
    pub sentence: String,
}

fn default_sentence() -> String {
    DEFAULT_SENTENCE.to_string()
}

impl Default for CommitmentCfg {
    fn default() -> Self {
        Self {
            sentence: default_sentence(),
        }
    }
}

/// Blocking window presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UiCfg {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_true")]
    pub fullscreen: bool,

    #[serde(default = "default_true")]
    pub always_on_top: bool,

    #[serde(default = "default_font_size")]
    pub font_size: u16,
}

fn default_title() -> String {
    "Curfew".to_string()
}

fn default_true() -> bool {
    true
}

fn default_font_size() -> u16 {
    28
}

impl Default for UiCfg {
    fn default() -> Self {
        Self {
            title: default_title(),
            fullscreen: true,
            always_on_top: true,
            font_size: default_font_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingCfg {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Top-level configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CurfewConfig {
    #[serde(default)]
    pub commitment: CommitmentCfg,

    #[serde(default)]
    pub ui: UiCfg,

    #[serde(default)]
    pub logging: LoggingCfg,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

/// Tracks whether we parsed TOML or YAML so writes preserve format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

impl CurfewConfig {
    /// Per-user configuration path from the platform config directory.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Pick the config path: explicit argument, then `CURFEW_CONFIG`, then the user path.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(value) = env::var(CONFIG_ENV) {
            if !value.trim().is_empty() {
                return Some(PathBuf::from(value));
            }
        }
        Self::user_config_path()
    }

    /// Parse a config file without validating it.
    pub fn read<P: AsRef<Path>>(path: P) -> CurfewResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let format = ConfigFormat::for_path(path);
        let mut cfg = match format {
            ConfigFormat::Toml => toml::from_str::<Self>(&contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Self>(&contents)?,
        };
        cfg.path = path.to_path_buf();
        cfg.format = format;
        Ok(cfg)
    }

    /// Read a config file from disk, detect format, and reject unusable values.
    pub fn load<P: AsRef<Path>>(path: P) -> CurfewResult<Self> {
        let cfg = Self::read(path)?;
        let issues = cfg.validate();
        if !issues.is_empty() {
            return Err(CurfewError::InvalidConfig(issues.join("; ")));
        }
        Ok(cfg)
    }

    /// Load `path` when it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> CurfewResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        info!(
            "no configuration at {}; using built-in defaults",
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            format: ConfigFormat::for_path(path),
            ..Self::default()
        })
    }

    /// Human-readable problems with this configuration; empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let sentence = &self.commitment.sentence;
        if sentence.trim().is_empty() {
            issues.push("commitment.sentence must not be empty".to_string());
        } else if sanitize(sentence) != *sentence {
            issues.push(
                "commitment.sentence must contain printable ASCII characters only".to_string(),
            );
        }
        if sentence.chars().count() > MAX_RAW_INPUT_CHARS {
            issues.push(format!(
                "commitment.sentence must be at most {MAX_RAW_INPUT_CHARS} characters"
            ));
        }

        if self.ui.title.trim().is_empty() {
            issues.push("ui.title must not be empty".to_string());
        }
        if !FONT_SIZE_RANGE.contains(&self.ui.font_size) {
            issues.push(format!(
                "ui.font_size must be between {} and {}",
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end()
            ));
        }

        if !logging::is_valid_level(&self.logging.level) {
            issues.push(format!(
                "logging.level `{}` is not one of off, error, warn, info, debug, trace",
                self.logging.level
            ));
        }

        issues
    }

    /// Render in the format this config was loaded from.
    pub fn render(&self) -> CurfewResult<String> {
        Ok(match self.format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        })
    }

    /// Write the default configuration to `path` unless a file already exists.
    ///
    /// Returns `Ok(true)` when a file was created.
    pub fn write_default(path: &Path) -> CurfewResult<bool> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let template = Self {
            format: ConfigFormat::for_path(path),
            ..Self::default()
        }
        .render()?;

        match OpenOptions::new().create_new(true).write(true).open(path) {
            Ok(mut file) => {
                file.write_all(template.as_bytes())?;
                file.flush()?;
                info!("default configuration written to {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

//!
//! This module defines configuration structures and loading logic for cellcheck.
//! Configuration lives in a `.cellcheck.toml` file discovered from the working directory upward.

use crate::orchestrator::ScanConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".cellcheck.toml";

/// Which existing entries make a new issue a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LabelDedup {
    /// An issue is skipped when any category already lists the same label for any cell
    #[default]
    Document,
    /// An issue is skipped only when its own cell already lists the same label
    Cell,
}

impl fmt::Display for LabelDedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelDedup::Document => write!(f, "document"),
            LabelDedup::Cell => write!(f, "cell"),
        }
    }
}

impl FromStr for LabelDedup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(LabelDedup::Document),
            "cell" => Ok(LabelDedup::Cell),
            _ => Err(format!("Unknown label-dedup mode: {s} (expected \"document\" or \"cell\")")),
        }
    }
}

/// Configuration for cellcheck
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Global configuration options
    pub global: GlobalConfig,

    /// Model-backed rewrite suggestions
    pub suggestions: SuggestionConfig,

    /// Image scoring thresholds
    pub visuals: VisualsConfig,
}

impl Config {
    /// Load configuration from an explicit path, or discover `.cellcheck.toml`
    /// from the current directory upward. No file means defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let cwd = std::env::current_dir().map_err(|source| ConfigError::IoError {
                    source,
                    path: ".".to_string(),
                })?;
                discover_config_file(&cwd)
            }
        };

        match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                log::debug!("No {CONFIG_FILE_NAME} found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            source,
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Flags threaded explicitly into every scan entry point
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            enabled: self.global.enabled,
            model_already_warmed: self.suggestions.model_already_warmed,
        }
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.global.reconcile_delay_ms)
    }
}

/// Global configuration options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// Master switch; when false every scan clears the checked cells and detects nothing
    pub enabled: bool,

    /// Enabled rules
    pub enable: Vec<String>,

    /// Disabled rules
    pub disable: Vec<String>,

    /// Duplicate-label policy of the issue index
    pub label_dedup: LabelDedup,

    /// Settle time before dropping entries of deleted cells. Too short a
    /// delay against a live editor can drop entries for cells that still exist.
    pub reconcile_delay_ms: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable: Vec::new(),
            disable: Vec::new(),
            label_dedup: LabelDedup::default(),
            reconcile_delay_ms: 0,
        }
    }
}

/// Local model server used for rewrite suggestions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct SuggestionConfig {
    /// Base URL of the server, with trailing slash
    pub endpoint: String,

    /// Model name passed to the server
    pub model: String,

    /// Skip pulling the model before the first request
    pub model_already_warmed: bool,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/".to_string(),
            model: "mistral".to_string(),
            model_already_warmed: false,
        }
    }
}

/// Thresholds for image scores; scores strictly below a threshold are reported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct VisualsConfig {
    /// Minimum text contrast ratio
    pub contrast_threshold: f64,

    /// Minimum opacity on a 0-10 scale
    pub transparency_threshold: f64,
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            contrast_threshold: 4.5,
            transparency_threshold: 9.0,
        }
    }
}

/// Walk up from `start` looking for `.cellcheck.toml`, stopping at a
/// repository root (a directory containing `.git`)
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            break;
        }
    }
    None
}

/// Create a default configuration file at the specified path
pub fn create_default_config(path: &str) -> Result<(), ConfigError> {
    if Path::new(path).exists() {
        return Err(ConfigError::FileExists { path: path.to_string() });
    }

    let default_config = r#"# cellcheck configuration file

[global]
# Set to false to turn all checks off
enabled = true

# List of rules to disable (uncomment and modify as needed)
# disable = ["NB005"]

# List of rules to enable exclusively (if provided, only these rules will run)
# enable = ["NB001", "NB002"]

# "document": skip an issue whose label is already listed anywhere
# "cell": skip it only when the same cell already lists it
label-dedup = "document"

# Milliseconds to wait before dropping issues of deleted cells
reconcile-delay-ms = 0

[suggestions]
endpoint = "http://localhost:11434/"
model = "mistral"
model-already-warmed = false

[visuals]
contrast-threshold = 4.5
transparency-threshold = 9.0
"#;

    fs::write(path, default_config).map_err(|err| ConfigError::IoError {
        source: err,
        path: path.to_string(),
    })
}

/// JSON schema of the configuration file
pub fn config_schema() -> Result<String, ConfigError> {
    let schema = schemars::schema_for!(Config);
    serde_json::to_string_pretty(&schema).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file at {path}: {source}")]
    IoError { source: io::Error, path: String },

    /// Failed to parse the configuration content
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Configuration file already exists
    #[error("Configuration file already exists at {path}")]
    FileExists { path: String },
}

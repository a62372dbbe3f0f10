//! Configuration loading and resolution

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "COFFEE_CHAT_CONFIG";

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "coffee-chat.toml";

/// Where the participant id registry is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// `name,id` rows (default, same format as past runs)
    #[default]
    Csv,

    /// SQLite database with an append-only participants table
    Sqlite,
}

impl RegistryBackend {
    /// Registry location used when `ids_file` is not configured
    pub fn default_path(self) -> PathBuf {
        match self {
            RegistryBackend::Csv => PathBuf::from("ids").join("ids.csv"),
            RegistryBackend::Sqlite => PathBuf::from("ids").join("ids.db"),
        }
    }
}

/// How an odd-sized roster is evened out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParityMode {
    /// Ask on the terminal which candidate sits out
    #[default]
    Prompt,

    /// Drop the first candidate on the roster without asking
    Drop,

    /// Add the stand-in participant
    SitIn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParityConfig {
    pub mode: ParityMode,

    /// Volunteers who may sit out, in order of preference
    pub candidates: Vec<String>,

    /// Participant who joins in sit-in mode
    pub stand_in: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of past pairing files and constraint files
    pub pairings_dir: PathBuf,

    /// Registry location; defaults to `ids/ids.csv` or `ids/ids.db` by backend
    pub ids_file: Option<PathBuf>,

    pub registry_backend: RegistryBackend,

    /// Write logs to timestamped files here instead of stderr
    pub logs_dir: Option<PathBuf>,

    /// Pairing files whose name ends with this are constraints only, not history
    pub constraints_suffix: String,

    /// Tie-break seed for the first attempt; retries derive new seeds from it
    pub seed: Option<u64>,

    pub parity: ParityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pairings_dir: PathBuf::from("pairings"),
            ids_file: None,
            registry_backend: RegistryBackend::Csv,
            logs_dir: None,
            constraints_suffix: "constraints.csv".to_string(),
            seed: None,
            parity: ParityConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Config::from_toml_str(&content)
    }

    /// Load configuration following priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. Environment variable
    /// 3. `coffee-chat.toml` in the working directory
    /// 4. Compiled defaults
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, std::env::var(CONFIG_ENV_VAR).ok()) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Config::from_file(&path)
            }
            None => {
                debug!("No config file, using defaults");
                Ok(Config::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.constraints_suffix.trim().is_empty() {
            return Err(Error::Configuration(
                "constraints_suffix must not be empty".to_string(),
            ));
        }
        if self.parity.mode == ParityMode::SitIn && self.parity.stand_in.is_none() {
            return Err(Error::Configuration(
                "parity mode sit-in requires a stand_in".to_string(),
            ));
        }
        Ok(())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.ids_file
            .clone()
            .unwrap_or_else(|| self.registry_backend.default_path())
    }

    /// Whether a pairing file only holds constraints (not past pairings)
    pub fn is_constraints_file(&self, file_name: &str) -> bool {
        file_name
            .to_lowercase()
            .ends_with(&self.constraints_suffix.to_lowercase())
    }
}

/// Pick the config file: explicit argument, then env var, then the
/// working-directory default if it exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_value: Option<String>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    if default.exists() {
        return Some(default);
    }

    None
}

//! Configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (clap, which also reads the matching env var)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Env var naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "XPI_CONFIG";

pub const DEFAULT_UI_PORT: u16 = 3000;
pub const DEFAULT_AN_PORT: u16 = 3001;
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_ANALYSIS_URL: &str = "http://localhost:3001";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[ui]` section (application API service)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    pub port: Option<u16>,
    pub app_url: Option<String>,
    pub analysis_url: Option<String>,
}

/// `[analysis]` section (analysis trigger service)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub port: Option<u16>,
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub openai_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Location of the TOML config file: `$XPI_CONFIG`, else `<config dir>/xpi/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("xpi").join("config.toml"))
}

/// Load the TOML config, falling back to defaults if the file is missing
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config directory available, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Log filter directive: a non-empty `RUST_LOG` wins over the configured level
pub fn log_directive(rust_log: Option<&str>, configured: &str) -> String {
    rust_log
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .unwrap_or(configured)
        .to_string()
}

/// Pick the first available value: command line/env, then TOML, then default
pub fn resolve<T>(cli: Option<T>, toml: Option<T>, default: T) -> T {
    cli.or(toml).unwrap_or(default)
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("xpi").join("xpi.db"))
        .unwrap_or_else(|| PathBuf::from("./xpi_data/xpi.db"))
}

/// Resolve the shared database path
pub fn resolve_database_path(cli: Option<PathBuf>, toml: &TomlConfig) -> PathBuf {
    resolve(cli, toml.database_path.clone(), default_database_path())
}

/// Validate a base URL setting (http/https, no trailing slash kept)
pub fn normalize_base_url(name: &str, url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "{} must start with http:// or https:// (got '{}')",
            name, url
        )));
    }
    Ok(trimmed.to_string())
}

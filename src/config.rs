//! config
//!
//! Loading a [`ForgeConfig`] from files and strings.
//!
//! # Format
//!
//! A config file holds one forge, tagged by `type`:
//!
//! ```toml
//! type = "azure-devops"
//! token = "..."
//! orgUrl = "https://dev.azure.com/acme"
//! ```
//!
//! Files ending in `.json` are read as JSON with the same shape; everything
//! else is TOML.
//!
//! # Locations
//!
//! [`default_config_path`] resolves, in order:
//! 1. `$POLYFORGE_CONFIG` if set
//! 2. `<config dir>/polyforge/forge.toml` (`$XDG_CONFIG_HOME` on Linux)
//!
//! # Example
//!
//! ```
//! use polyforge::config;
//! use polyforge::forge::Provider;
//!
//! let config = config::load_from_str(r#"
//!     type = "gitlab"
//!     token = "glpat-xxx"
//!     baseUrl = "https://gitlab.example.com"
//! "#).unwrap();
//! assert_eq!(config.provider(), Provider::GitLab);
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

use crate::forge::ForgeConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "POLYFORGE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config{}: {message}", path_suffix(.path))]
    ParseError {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("config directory not found")]
    NoConfigDir,
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" file '{}'", p.display()),
        None => String::new(),
    }
}

/// Parse a TOML config.
pub fn load_from_str(contents: &str) -> Result<ForgeConfig, ConfigError> {
    let config: ForgeConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
        path: None,
        message: e.to_string(),
    })?;
    validate(&config)?;
    Ok(config)
}

/// Parse a JSON config.
pub fn load_from_json_str(contents: &str) -> Result<ForgeConfig, ConfigError> {
    let config: ForgeConfig =
        serde_json::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: None,
            message: e.to_string(),
        })?;
    validate(&config)?;
    Ok(config)
}

/// Read and parse a config file. `.json` files are JSON, others TOML.
pub fn load_from_path(path: &Path) -> Result<ForgeConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let parsed = if is_json_path(path) {
        load_from_json_str(&contents)
    } else {
        load_from_str(&contents)
    };

    let config = parsed.map_err(|e| match e {
        ConfigError::ParseError { message, .. } => ConfigError::ParseError {
            path: Some(path.to_path_buf()),
            message,
        },
        other => other,
    })?;

    tracing::debug!(path = %path.display(), provider = %config.provider(), "loaded forge config");
    Ok(config)
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load the config from [`default_config_path`].
///
/// A missing file is not an error and yields `None`.
pub fn load_default() -> Result<Option<ForgeConfig>, ConfigError> {
    let path = default_config_path()?;
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no forge config file");
        return Ok(None);
    }
    load_from_path(&path).map(Some)
}

/// Where the config file lives.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    resolve_config_path(std::env::var_os(CONFIG_ENV).map(PathBuf::from), dirs::config_dir())
}

fn resolve_config_path(
    env_override: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    let dir = config_dir.ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join("polyforge").join("forge.toml"))
}

/// Check field values serde cannot: URLs parse and the token is present.
pub fn validate(config: &ForgeConfig) -> Result<(), ConfigError> {
    if config.token().trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "token",
            message: "must not be empty".to_string(),
        });
    }

    let (field, url) = match config {
        ForgeConfig::GitHub { base_url, .. } | ForgeConfig::GitLab { base_url, .. } => {
            ("baseUrl", base_url.as_deref())
        }
        ForgeConfig::AzureDevOps { org_url, .. } => ("orgUrl", Some(org_url.as_str())),
    };

    if let Some(url) = url {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            field,
            message: format!("'{}': {}", url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field,
                message: format!("'{}': scheme must be http or https", url),
            });
        }
    }

    Ok(())
}

/// Write a config file atomically, as JSON for `.json` paths and TOML
/// otherwise.
///
/// Creates parent directories if needed; writes a temp file in the same
/// directory and renames it into place.
pub fn write_to_path(path: &Path, config: &ForgeConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let (contents, temp_path) = if is_json_path(path) {
        let contents =
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue {
                field: "type",
                message: e.to_string(),
            })?;
        (contents, path.with_extension("json.tmp"))
    } else {
        let contents = toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue {
            field: "type",
            message: e.to_string(),
        })?;
        (contents, path.with_extension("toml.tmp"))
    };

    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;
    file.sync_all().map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

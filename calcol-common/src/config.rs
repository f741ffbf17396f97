//! Configuration loading and config-file discovery
//!
//! Settings are addressed by dotted keys (`search.google.api-key`,
//! `quota.brave.rate-limit`). Each key resolves in priority order:
//! 1. Environment variable derived from the key (see [`env_var_name`])
//! 2. TOML config file (nested tables follow the dots)
//! 3. Caller-supplied default
//!
//! A missing config file is not an error: the service starts with defaults.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Prefix for every environment override
pub const ENV_PREFIX: &str = "CALCOL_";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CALCOL_CONFIG";

/// Default config file name under `<config_dir>/calcol/`
pub const DEFAULT_CONFIG_FILE: &str = "calcol-enrich.toml";

/// Map a dotted key to its environment override name
///
/// `search.google.api-key` → `CALCOL_SEARCH_GOOGLE_API_KEY`
pub fn env_var_name(key: &str) -> String {
    let mut name = String::with_capacity(ENV_PREFIX.len() + key.len());
    name.push_str(ENV_PREFIX);
    for c in key.chars() {
        match c {
            '.' | '-' => name.push('_'),
            c => name.push(c.to_ascii_uppercase()),
        }
    }
    name
}

/// Layered configuration source (environment over TOML)
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    table: toml::Table,
    origin: Option<PathBuf>,
}

impl ConfigSource {
    /// Empty source: only environment overrides and defaults apply
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        Ok(Self {
            table,
            origin: None,
        })
    }

    /// Load a TOML file
    ///
    /// A missing file yields an empty source; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::empty());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let mut source = Self::from_toml_str(&content)?;
        source.origin = Some(path.to_path_buf());
        info!("Loaded config from {}", path.display());
        Ok(source)
    }

    /// Path the source was loaded from, if any
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Raw string lookup: environment first, then TOML
    ///
    /// Blank values (empty or whitespace) are treated as absent.
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Ok(value) = std::env::var(env_var_name(key)) {
            if !value.trim().is_empty() {
                debug!(key, "Config value taken from environment");
                return Some(value);
            }
        }

        match self.lookup(key)? {
            toml::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            toml::Value::String(_) => None,
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Typed lookup with a default
    ///
    /// A value that is present but does not parse is a configuration error.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_string(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid value for {}: {}", key, e))),
            None => Ok(default),
        }
    }

    /// String list lookup
    ///
    /// TOML arrays are used as-is; an environment value is split on commas.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        if let Ok(value) = std::env::var(env_var_name(key)) {
            let items: Vec<String> = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !items.is_empty() {
                return Some(items);
            }
        }

        match self.lookup(key)? {
            toml::Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.table.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }
}

/// Resolve the config file path
///
/// Priority: CLI argument → `CALCOL_CONFIG` → `<config_dir>/calcol/calcol-enrich.toml`.
/// Returns None when no candidate can be determined.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("calcol").join(DEFAULT_CONFIG_FILE))
}

/// OS-dependent default data folder (database lives here)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("calcol"))
        .unwrap_or_else(|| PathBuf::from("./calcol_data"))
}

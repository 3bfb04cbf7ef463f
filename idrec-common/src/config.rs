//! Bootstrap configuration loading
//!
//! Two sources feed the service configuration:
//! 1. **TOML bootstrap file**: database path, bind address, logging
//! 2. **Command-line / environment overrides** supplied by the binary
//!
//! # Config File Resolution
//!
//! 1. Explicit path (command-line argument)
//! 2. `IDREC_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/idrec/config.toml` on Linux)
//!
//! An explicitly named file that is missing is an error. A missing file at
//! the platform default location is not: compiled defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "IDREC_CONFIG";

/// Default HTTP port for idrec-identify
pub const DEFAULT_PORT: u16 = 5750;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional in the file; missing keys fall back to
/// compiled defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// TOML configuration plus the file it came from (if any)
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: Option<PathBuf>,
}

/// Locate the config file following the resolution order above
///
/// Returns `None` when nothing was requested and no file exists at the
/// platform default location.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|path| path.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("idrec").join("config.toml"))
}

/// Platform default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("idrec"))
        .unwrap_or_else(|| PathBuf::from("./idrec_data"))
        .join("contacts.db")
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))
}

/// Resolve and load the bootstrap configuration
///
/// Falls back to [`TomlConfig::default`] when no file is found.
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let config = load_toml_config(&path)?;
            Ok(LoadedConfig {
                config,
                source: Some(path),
            })
        }
        None => Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: None,
        }),
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Effective service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides onto the TOML config (overrides win)
    pub fn resolve(toml_config: TomlConfig, overrides: ConfigOverrides) -> Self {
        Self {
            database_path: overrides
                .database_path
                .or(toml_config.database_path)
                .unwrap_or_else(default_database_path),
            host: overrides.host.unwrap_or(toml_config.host),
            port: overrides.port.unwrap_or(toml_config.port),
            log_level: toml_config.logging.level,
        }
    }

    /// `host:port` string for binding the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5750);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("port = 8080\n").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides_win() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            database_path = "/var/lib/idrec/contacts.db"
            port = 6000

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let resolved = ServiceConfig::resolve(
            toml_config,
            ConfigOverrides {
                port: Some(7000),
                ..Default::default()
            },
        );

        assert_eq!(resolved.port, 7000);
        assert_eq!(resolved.database_path, PathBuf::from("/var/lib/idrec/contacts.db"));
        assert_eq!(resolved.log_level, "debug");
        assert_eq!(resolved.bind_address(), "127.0.0.1:7000");
    }

    #[test]
    fn test_default_database_path_is_named() {
        let path = default_database_path();
        assert!(path.ends_with("contacts.db"));
    }
}

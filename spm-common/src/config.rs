//! Bootstrap configuration loading
//!
//! Two tiers, following the service architecture:
//! 1. **TOML bootstrap**: database path, bind address, port, logging. Read once at startup.
//! 2. **Database runtime**: matching thresholds in the `settings` table
//!    (see [`crate::db::settings`]).
//!
//! Bootstrap priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "SPM_CONFIG";

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "SPM_DATABASE";

/// Environment variable overriding the HTTP port
pub const PORT_ENV_VAR: &str = "SPM_PORT";

/// Bootstrap configuration loaded from TOML
///
/// All fields are optional in the file; missing values fall back to
/// [`TomlConfig::default`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Interface the HTTP server binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
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

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OS-dependent default database location
///
/// `~/.local/share/spm/spm.db` on Linux, the platform data dir elsewhere.
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("spm").join("spm.db"))
        .unwrap_or_else(|| PathBuf::from("./spm_data/spm.db"))
}

/// Default TOML location for a named service (`~/.config/spm/<service>.toml`)
pub fn default_config_path(service_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spm").join(format!("{}.toml", service_name)))
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load from an explicit file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load bootstrap config for `service_name`
    ///
    /// A missing or unreadable config file is not fatal: it logs a warning and
    /// falls back to compiled defaults.
    pub fn load(service_name: &str, explicit_path: Option<&Path>) -> Self {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| default_config_path(service_name));

        match path {
            Some(path) if path.exists() => match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Apply environment and command-line overrides on top of the file values
    ///
    /// `cli_database` / `cli_port` win over environment variables, which win
    /// over whatever the TOML file (or defaults) provided.
    pub fn with_overrides(mut self, cli_database: Option<PathBuf>, cli_port: Option<u16>) -> Result<Self> {
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a valid port: {}", PORT_ENV_VAR, port)))?;
        }

        if let Some(path) = cli_database {
            self.database_path = path;
        }
        if let Some(port) = cli_port {
            self.port = port;
        }

        Ok(self)
    }
}

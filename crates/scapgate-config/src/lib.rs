#![deny(unsafe_code)]

//! Settings file loading and validation for scapgate.
//!
//! Loads the TOML settings file read at startup and validates it. Provides
//! the [`AppConfig`] type as the central configuration structure: where the
//! HTTP gateway listens, how it reaches the OpenSCAP daemon on D-Bus, the
//! default log level, and the optional basic-authentication credentials.

/// Redacted, zeroize-on-drop credential values.
pub mod secret;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use secret::Secret;

/// Environment variable that forces the session bus when set to `1`.
pub const SESSION_BUS_ENV: &str = "OSCAPD_SESSION_BUS";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// OpenSCAP daemon connection configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP basic authentication.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Configuration for the HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the gateway listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Verbose request logging and `debug` as the default log level.
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            debug: false,
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    5000
}

/// Which message bus the daemon is registered on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

/// What a multi-item operation does when one item's daemon calls fail.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// End the batch at the first failing item, returning what was gathered.
    Stop,
    /// Log the failing item and carry on with the rest.
    #[default]
    Skip,
}

/// Configuration for the OpenSCAP daemon connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bus to connect to.
    #[serde(default)]
    pub bus: BusKind,

    /// Well-known bus name of the daemon.
    #[serde(default = "default_service")]
    pub service: String,

    /// Object path exporting the daemon interface.
    #[serde(default = "default_object_path")]
    pub object_path: String,

    /// Interface name of the daemon API.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Failure handling for `get_task("all")` and system SSG discovery.
    #[serde(default)]
    pub batch_policy: BatchPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            service: default_service(),
            object_path: default_object_path(),
            interface: default_interface(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

fn default_service() -> String {
    "org.OpenSCAP.daemon".to_string()
}

fn default_object_path() -> String {
    "/OpenSCAP/daemon".to_string()
}

fn default_interface() -> String {
    "org.OpenSCAP.daemon.Interface".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
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

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP basic authentication.
///
/// ## TOML Example
///
/// ```toml
/// [auth]
/// enabled = true
/// username = "scanner"
/// password = "change-me"
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require credentials on every route.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: Secret,
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    ///
    /// Environment overrides are applied before validation.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup(SESSION_BUS_ENV).as_deref() == Some("1") && self.daemon.bus != BusKind::Session {
            info!(var = SESSION_BUS_ENV, "Using the session bus");
            self.daemon.bus = BusKind::Session;
        }
    }

    /// The log filter implied by the settings file.
    pub fn log_level(&self) -> &str {
        if self.server.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_port == 0 {
            return Err(ConfigError::Validation(
                "server.listen_port must be non-zero".to_string(),
            ));
        }
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "server.listen_addr must not be empty".to_string(),
            ));
        }

        if !is_dotted_name(&self.daemon.service) {
            return Err(ConfigError::Validation(format!(
                "daemon.service must be a dotted bus name, got {:?}",
                self.daemon.service
            )));
        }
        if !is_dotted_name(&self.daemon.interface) {
            return Err(ConfigError::Validation(format!(
                "daemon.interface must be a dotted interface name, got {:?}",
                self.daemon.interface
            )));
        }
        if !is_object_path(&self.daemon.object_path) {
            return Err(ConfigError::Validation(format!(
                "daemon.object_path must be an absolute object path, got {:?}",
                self.daemon.object_path
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        if self.auth.enabled {
            if self.auth.username.is_empty() {
                return Err(ConfigError::Validation(
                    "auth.username is required when auth is enabled".to_string(),
                ));
            }
            if self.auth.password.is_empty() {
                return Err(ConfigError::Validation(
                    "auth.password is required when auth is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_dotted_name(name: &str) -> bool {
    name.contains('.')
        && name
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(is_name_char))
}

fn is_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    match path.strip_prefix('/') {
        Some(rest) => rest.split('/').all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }),
        None => false,
    }
}

//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries, and [`TestConfigFile`] when
//! the code under test reads a settings file from disk.

use std::path::{Path, PathBuf};

use scapgate_config::{AppConfig, BatchPolicy, BusKind, Secret};
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .listen_port(8080)
///     .batch_policy(BatchPolicy::Stop)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.config.server.listen_addr = addr.to_string();
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.server.listen_port = port;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.server.debug = debug;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn session_bus(mut self) -> Self {
        self.config.daemon.bus = BusKind::Session;
        self
    }

    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.config.daemon.batch_policy = policy;
        self
    }

    /// Require HTTP basic authentication with these credentials.
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.config.auth.enabled = true;
        self.config.auth.username = username.to_string();
        self.config.auth.password = Secret::new(password);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A settings file in a temporary directory.
///
/// The directory is deleted when this value is dropped, even on panic.
pub struct TestConfigFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfigFile {
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("scapgate.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> AppConfig {
        AppConfig::load(&self.path)
            .await
            .expect("failed to parse test config")
    }
}

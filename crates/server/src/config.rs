//! Server configuration management

use anyhow::{Context, Result, anyhow};
use protocol::USBIP_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address; loopback by default since the emulator is a test fixture
    #[serde(default = "ServerSettings::default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "ServerSettings::default_log_level")]
    pub log_level: String,
    /// Close a connection after this many seconds without a frame
    /// (None = wait forever)
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: Self::default_bind_addr(),
            log_level: Self::default_log_level(),
            idle_timeout_secs: None,
        }
    }
}

impl ServerSettings {
    fn default_bind_addr() -> String {
        format!("127.0.0.1:{}", USBIP_PORT)
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind_addr))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl ServerConfig {
    /// Load configuration from the specified path
    ///
    /// Values are not validated here; call [`ServerConfig::validate`] once
    /// command-line overrides have been applied.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            expand_path(&p)
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/uboat/server.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("uboat").join("server.toml")
        } else {
            PathBuf::from(".config/uboat/server.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.server.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.server.log_level,
                valid_levels.join(", ")
            ));
        }

        self.server.socket_addr()?;

        if self.server.idle_timeout_secs == Some(0) {
            return Err(anyhow!("idle_timeout_secs must be greater than 0"));
        }

        Ok(())
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

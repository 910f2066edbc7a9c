//! Configuration system for the holepunch CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Holepunch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// STUN binding responder
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// WebSocket signaling relay
    #[serde(default)]
    pub signaling: SignalingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// STUN responder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Run the responder
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// UDP listen address
    #[serde(default = "default_stun_addr")]
    pub listen_addr: String,
    /// Receive workers sharing the socket
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Signaling relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalingConfig {
    /// Run the relay
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TCP listen address
    #[serde(default = "default_signal_addr")]
    pub listen_addr: String,
    /// WebSocket upgrade path
    #[serde(default = "default_path")]
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_true() -> bool {
    true
}

fn default_stun_addr() -> String {
    "0.0.0.0:3478".to_string()
}

fn default_signal_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_path() -> String {
    holepunch_signal::server::DEFAULT_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upper bound on responder workers
const MAX_WORKERS: usize = 64;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_stun_addr(),
            workers: default_workers(),
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_signal_addr(),
            path: default_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config {}: {e}", path.display()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("holepunch/config.toml")
    }

    /// Resolve the configuration to use
    ///
    /// An explicit path must exist. Without one, the default path is read if
    /// present and built-in defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any file fails to parse.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse the STUN listen address
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn stun_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_addr(&self.discovery.listen_addr, "discovery.listen_addr")
    }

    /// Parse the signaling listen address
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed.
    pub fn signal_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_addr(&self.signaling.listen_addr, "signaling.listen_addr")
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.discovery.enabled && !self.signaling.enabled {
            anyhow::bail!("Nothing to run: both discovery and signaling are disabled");
        }

        self.stun_addr()?;
        self.signal_addr()?;

        if self.discovery.workers == 0 || self.discovery.workers > MAX_WORKERS {
            anyhow::bail!("Workers must be between 1 and {MAX_WORKERS}");
        }

        if !self.signaling.path.starts_with('/') {
            anyhow::bail!(
                "Invalid signaling path: {}. Must start with '/'",
                self.signaling.path
            );
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }
}

fn parse_addr(addr: &str, field: &str) -> anyhow::Result<SocketAddr> {
    addr.parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("Invalid {field} '{addr}': {e}"))
}

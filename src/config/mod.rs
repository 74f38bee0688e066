//! Configuration module
//!
//! Handles loading and saving eonet configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::NetworkConfig as ConnectConfig;
use crate::protocol::{Version, CLIENT_VERSION, DEFAULT_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// What the client reports about itself during the handshake
    #[serde(default)]
    pub client: ClientConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log file path (optional)
    pub log_file: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    5000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// Client identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_major")]
    pub version_major: u8,
    #[serde(default = "default_minor")]
    pub version_minor: u8,
    #[serde(default = "default_patch")]
    pub version_patch: u8,
    /// Hardware id sent in the init request (auto-generated if not set)
    pub hdid: Option<String>,
}

fn default_major() -> u8 {
    CLIENT_VERSION.major
}

fn default_minor() -> u8 {
    CLIENT_VERSION.minor
}

fn default_patch() -> u8 {
    CLIENT_VERSION.patch
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version_major: default_major(),
            version_minor: default_minor(),
            version_patch: default_patch(),
            hdid: None,
        }
    }
}

impl ClientConfig {
    pub fn version(&self) -> Version {
        Version::new(self.version_major, self.version_minor, self.version_patch)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("eonet/config.toml")),
            Some(PathBuf::from("./eonet.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the hardware id, generating one if not set.
    ///
    /// Servers expect a decimal number, so a generated id is the low
    /// digits of a random uuid.
    pub fn hdid(&self) -> String {
        self.client.hdid.clone().unwrap_or_else(|| {
            (uuid::Uuid::new_v4().as_u128() % 1_000_000_000).to_string()
        })
    }

    /// Connection settings for the network layer
    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            port: self.network.port,
            connect_timeout_ms: self.network.connect_timeout_ms,
            version: self.client.version(),
            hdid: self.hdid(),
        }
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        network: NetworkConfig {
            host: "game.example.net".to_string(),
            ..Default::default()
        },
        client: ClientConfig {
            hdid: Some("161726351".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

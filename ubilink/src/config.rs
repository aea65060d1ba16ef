//! Configuration file handling for ubilink.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use ubilink_client::DEFAULT_HOST;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Device identity and the variables the demo loop works with.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    /// Ubidots account token, sent as the MQTT user name
    pub token: Option<String>,

    /// Device label, also used as the MQTT client id
    pub id: Option<String>,

    /// Variable the demo value is published to
    #[serde(default = "default_variable")]
    pub variable: String,

    /// Variables whose last value updates are printed
    #[serde(default)]
    pub subscribe: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            token: None,
            id: None,
            variable: default_variable(),
            subscribe: Vec::new(),
        }
    }
}

fn default_variable() -> String {
    "demo".to_string()
}

/// Broker connection settings.
#[derive(Debug, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Connect over TLS on port 8883
    #[serde(default)]
    pub tls: bool,

    /// Optional path to a PEM CA certificate replacing the bundled roots
    pub ca_path: Option<PathBuf>,

    /// Skip certificate verification
    #[serde(default)]
    pub insecure: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            tls: false,
            ca_path: None,
            insecure: false,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit the session's progress lines
    #[serde(default = "default_session_logging")]
    pub session: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            session: default_session_logging(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_logging() -> bool {
    true
}

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use ubilink_core::protocol::ProtocolVersion;

/// Ubidots industrial MQTT broker.
pub const DEFAULT_HOST: &str = "industrial.api.ubidots.com";
pub const PLAIN_PORT: u16 = 1883;
pub const TLS_PORT: u16 = 8883;

/// Client identifier used when the device id is empty.
pub const DEFAULT_CLIENT_ID: &str = "ubilink";

pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS configuration for the encrypted transport.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Path to custom CA certificate file (PEM format).
    /// If not set, the bundled webpki roots are used.
    pub ca_path: Option<PathBuf>,
    /// Skip server certificate verification (insecure, for testing only).
    pub danger_skip_verify: bool,
}

/// Everything a [`Session`](crate::Session) needs at construction.
///
/// ```
/// use ubilink_client::SessionConfig;
///
/// let config = SessionConfig::new("BBFF-token", "pump-01")
///     .encrypted(true)
///     .logging(false);
///
/// assert_eq!(config.port(), 8883);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) token: String,
    pub(crate) device_id: String,
    pub(crate) encrypted: bool,
    pub(crate) logging: bool,
    pub(crate) host: String,
    pub(crate) tls: TlsOptions,
}

impl SessionConfig {
    pub fn new(token: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            device_id: device_id.into(),
            encrypted: false,
            logging: true,
            host: DEFAULT_HOST.to_string(),
            tls: TlsOptions::default(),
        }
    }

    /// Use the TLS transport on port 8883 instead of plain TCP on 1883.
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Enable the session's progress log lines.
    pub fn logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Override the broker host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set custom CA certificate file path for TLS verification.
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls.ca_path = Some(path.into());
        self
    }

    /// Skip TLS certificate verification (insecure, for testing only).
    pub fn danger_skip_tls_verify(mut self, skip: bool) -> Self {
        self.tls.danger_skip_verify = skip;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging
    }

    pub fn broker_host(&self) -> &str {
        &self.host
    }

    pub fn tls_options(&self) -> &TlsOptions {
        &self.tls
    }

    /// Broker port of the selected transport variant.
    pub fn port(&self) -> u16 {
        if self.encrypted {
            TLS_PORT
        } else {
            PLAIN_PORT
        }
    }
}

/// MQTT CONNECT parameters handed to the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub protocol_version: ProtocolVersion,
    pub keep_alive: u16,
    pub clean_session: bool,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::V3_1_1,
            keep_alive: DEFAULT_KEEP_ALIVE_SECS,
            clean_session: true,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
        }
    }
}

impl From<&SessionConfig> for ConnectOptions {
    /// The broker authenticates with the token as user name and an empty password.
    fn from(config: &SessionConfig) -> Self {
        let client_id = if config.device_id.is_empty() {
            DEFAULT_CLIENT_ID.to_string()
        } else {
            config.device_id.clone()
        };

        Self {
            client_id,
            username: Some(config.token.clone()),
            password: Some(Bytes::new()),
            ..Default::default()
        }
    }
}

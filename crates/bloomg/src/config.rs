//! Client Configuration
//!
//! Provides the settings needed to reach a bloomg server, loadable from
//! TOML or JSON files.

use crate::error::{BloomgError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Which wire encoding to speak
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON bodies over HTTP
    #[default]
    Http,
    /// Length-prefixed protobuf over TCP
    Rpc,
}

impl std::str::FromStr for TransportKind {
    type Err = BloomgError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "json" => Ok(Self::Http),
            "rpc" | "binary" => Ok(Self::Rpc),
            other => Err(BloomgError::Config(format!("unknown transport: {}", other))),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Rpc => write!(f, "rpc"),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server base URL (`http://host:port`) or RPC address (`host:port`)
    pub server: String,
    /// Wire encoding
    #[serde(default)]
    pub transport: TransportKind,
    /// Deadline for every remote call (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long the filter name cache stays fresh (seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// User-Agent sent by the HTTP transport
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Largest response body or frame accepted
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("bloomg-rs/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the server
    pub fn new(server: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            server: server.into(),
            transport,
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            user_agent: default_user_agent(),
            max_body_size: default_max_body_size(),
        }
    }

    /// HTTP configuration for a base URL
    pub fn http(server: impl Into<String>) -> Self {
        Self::new(server, TransportKind::Http)
    }

    /// RPC configuration for a `host:port` address
    pub fn rpc(addr: impl Into<String>) -> Self {
        Self::new(addr, TransportKind::Rpc)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BloomgError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| BloomgError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BloomgError::Config(format!("{}: {}", path.display(), e)))?;

        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let config = match ext {
            "toml" => Self::from_toml(&content)?,
            "json" => Self::from_json(&content)?,
            other => {
                return Err(BloomgError::Config(format!(
                    "unsupported config format: {:?}",
                    other
                )))
            }
        };

        info!("Loaded client config from {} ({} transport)", path.display(), config.transport);
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(BloomgError::Config("timeout must be at least one second".to_string()));
        }
        if self.max_body_size == 0 {
            return Err(BloomgError::Config("max_body_size must be non-zero".to_string()));
        }

        match self.transport {
            TransportKind::Http => {
                let url = url::Url::parse(&self.server)
                    .map_err(|e| BloomgError::Config(format!("invalid server url {}: {}", self.server, e)))?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(BloomgError::Config(format!(
                        "unsupported url scheme: {}",
                        url.scheme()
                    )));
                }
                if url.host_str().is_none() {
                    return Err(BloomgError::Config("server url has no host".to_string()));
                }
            }
            TransportKind::Rpc => {
                if self.server.parse::<SocketAddr>().is_err() && !is_host_port(&self.server) {
                    return Err(BloomgError::Config(format!(
                        "invalid rpc address (expected host:port): {}",
                        self.server
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

//! appgrid.toml platform configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// First port handed out to inbound-network plugin proxies.
pub const DEFAULT_STREAM_PORT_START: u16 = 65301;

/// Last usable plugin proxy port (inclusive).
pub const DEFAULT_STREAM_PORT_END: u16 = 65535;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub stream_ports: StreamPortsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Host-side roots that volume host paths are derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Root of the shared file system (share-file volumes).
    pub share_path: String,
    /// Root on the node's local disk (local volumes).
    pub local_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            share_path: "/grdata".to_string(),
            local_path: "/grlocaldata".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamPortsConfig {
    pub start: u16,
    pub end: u16,
}

impl Default for StreamPortsConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_STREAM_PORT_START,
            end: DEFAULT_STREAM_PORT_END,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Topic builder/worker tasks are sent to.
    pub worker_topic: String,
    /// Upper bound on a single enqueue (e.g., "3s", "500ms").
    pub send_timeout: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_topic: "worker".to_string(),
            send_timeout: "3s".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn send_timeout(&self) -> Duration {
        parse_duration(&self.send_timeout).unwrap_or(Duration::from_secs(3))
    }
}

impl PlatformConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PlatformConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_ports.start > self.stream_ports.end {
            return Err(ConfigError::Invalid(format!(
                "stream_ports.start ({}) is above stream_ports.end ({})",
                self.stream_ports.start, self.stream_ports.end
            )));
        }
        if parse_duration(&self.queue.send_timeout).is_none() {
            return Err(ConfigError::Invalid(format!(
                "queue.send_timeout is not a duration: {:?}",
                self.queue.send_timeout
            )));
        }
        Ok(())
    }
}

/// Parse a short duration string such as `"500ms"`, `"3s"` or `"5m"`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        None
    }
}

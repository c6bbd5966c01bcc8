//! Server configuration and the catapult endpoint derived from it.

use forge_core::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CATAPULT_PORT: u16 = 80;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_root() -> PathBuf {
    std::env::temp_dir().join("forge-root")
}

fn default_relay_idle_timeout_secs() -> u64 {
    600
}

fn default_relay_sweep_interval_secs() -> u64 {
    30
}

/// Settings read from an optional YAML file, then overlaid by CLI flags and
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Selection used by describe, validate and next, which never write, and
    /// parent of the per-request working directories.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Catapult service host. Required by the catapult endpoint only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catapult_host: Option<String>,
    /// Kept as text so a malformed value is reported when it is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catapult_port: Option<String>,
    /// Commands to expose. Empty means every built-in command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default = "default_relay_idle_timeout_secs")]
    pub relay_idle_timeout_secs: u64,
    #[serde(default = "default_relay_sweep_interval_secs")]
    pub relay_sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root: default_root(),
            catapult_host: None,
            catapult_port: None,
            commands: Vec::new(),
            relay_idle_timeout_secs: default_relay_idle_timeout_secs(),
            relay_sweep_interval_secs: default_relay_sweep_interval_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&data).map_err(|e| {
            ForgeError::Configuration(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn relay_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_idle_timeout_secs)
    }

    pub fn relay_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.relay_sweep_interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// CatapultEndpoint
// ---------------------------------------------------------------------------

/// Address of the downstream catapult service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatapultEndpoint {
    pub host: String,
    pub port: u16,
}

impl CatapultEndpoint {
    /// Fails with [`ForgeError::Configuration`] when the host is missing or
    /// the port is not a number.
    pub fn resolve(config: &ServerConfig) -> Result<Self> {
        let host = config
            .catapult_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                ForgeError::Configuration(
                    "CATAPULT_SERVICE_HOST environment variable is not set".into(),
                )
            })?;

        let port = match config.catapult_port.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_CATAPULT_PORT,
            Some(raw) => raw.parse().map_err(|_| {
                ForgeError::Configuration(format!(
                    "CATAPULT_SERVICE_PORT must be a port number, got '{raw}'"
                ))
            })?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn upload_url(&self) -> String {
        format!("http://{}:{}/api/catapult/upload", self.host, self.port)
    }

    pub fn status_url(&self, correlation_id: &str) -> String {
        format!(
            "ws://{}:{}/api/catapult/status/{correlation_id}",
            self.host, self.port
        )
    }
}

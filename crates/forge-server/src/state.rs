use chrono::{DateTime, Utc};
use forge_core::workdir::Reaper;
use forge_core::CommandRegistry;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::relay::StatusRelay;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CommandRegistry>,
    pub config: Arc<ServerConfig>,
    pub reaper: Reaper,
    pub relay: StatusRelay,
    pub http: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Must be called inside a Tokio runtime: the working-directory reaper and
    /// the relay sweeper are spawned here.
    pub fn new(config: ServerConfig) -> Self {
        let mut registry = CommandRegistry::with_builtin_commands();
        if !config.commands.is_empty() {
            registry.retain(&config.commands);
        }
        tracing::debug!(commands = ?registry.names(), "command registry ready");

        if let Err(e) = std::fs::create_dir_all(&config.root) {
            tracing::warn!(root = %config.root.display(), error = %e, "cannot create root directory");
        }

        let relay = StatusRelay::new(config.relay_idle_timeout());
        relay.spawn_sweeper(config.relay_sweep_interval());

        Self {
            registry: Arc::new(registry),
            reaper: Reaper::spawn(),
            relay,
            http: reqwest::Client::new(),
            started_at: Utc::now(),
            config: Arc::new(config),
        }
    }
}

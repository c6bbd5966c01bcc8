use anyhow::Context;
use clap::Args;
use forge_server::config::ServerConfig;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (0 = OS-assigned)
    #[arg(long, env = "FORGE_PORT")]
    port: Option<u16>,

    /// Catapult service host
    #[arg(long, env = "CATAPULT_SERVICE_HOST")]
    catapult_host: Option<String>,

    /// Catapult service port
    #[arg(long, env = "CATAPULT_SERVICE_PORT")]
    catapult_port: Option<String>,

    /// Commands to expose (comma-separated; default: all)
    #[arg(long, env = "FORGE_COMMANDS", value_delimiter = ',')]
    commands: Vec<String>,
}

impl ServeArgs {
    /// File settings first, then flags and environment variables on top.
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.catapult_host.is_some() {
            config.catapult_host = self.catapult_host;
        }
        if self.catapult_port.is_some() {
            config.catapult_port = self.catapult_port;
        }
        if !self.commands.is_empty() {
            config.commands = self.commands;
        }
        Ok(config)
    }
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.into_config()?;
    if config.catapult_host.is_none() {
        tracing::warn!("CATAPULT_SERVICE_HOST is not set; catapult uploads and status relays will fail");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
        let actual_port = listener.local_addr()?.port();
        println!("forge server → http://localhost:{actual_port}");

        tokio::select! {
            res = forge_server::serve_on(config, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}

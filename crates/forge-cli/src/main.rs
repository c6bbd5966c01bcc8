mod cmd;
mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "forge",
    about = "Stateless project generator: run wizard commands locally or serve them over HTTP",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(cmd::serve::ServeArgs),

    /// List available commands
    Commands,

    /// Describe a command, optionally replaying its wizard up to a step
    Describe {
        name: String,

        /// Field value as key=value (repeatable)
        #[arg(short = 'i', long = "input", value_parser = cmd::parse_input)]
        inputs: Vec<(String, String)>,

        /// Step to advance to
        #[arg(long, default_value = "0")]
        step: usize,
    },

    /// Execute a command with the given inputs
    Run(cmd::run::RunArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(args),
        Commands::Commands => cmd::commands::run(cli.json),
        Commands::Describe { name, inputs, step } => cmd::describe::run(&name, inputs, step),
        Commands::Run(args) => cmd::run::run(args, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}


mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Lumen -- browser instrumentation and scoring pipeline.
#[derive(Parser, Debug)]
#[command(name = "lumen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured passes and checks against a page
    Run {
        /// DevTools WebSocket endpoint of a running browser
        /// (e.g. ws://localhost:9222/devtools/page/<target>)
        #[arg(long)]
        endpoint: String,

        /// Target page URL; overrides the config file's url
        #[arg(long)]
        url: Option<String>,

        /// Path to a lumen.toml layered over the built-in defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective default configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            endpoint,
            url,
            config,
        } => commands::run::execute(&endpoint, url, config).await,
        Commands::ShowConfig => commands::show_config::execute(),
    }
}

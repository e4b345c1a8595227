//! Chatwire Server
//!
//! Run with: cargo run --bin chatwire-server
//!
//! # Configuration
//!
//! Loaded from `--config`, or the default locations, with `CHATWIRE_*`
//! environment overrides. `--host` and `--port` win over both.
//! `RUST_LOG` overrides the configured log level.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chatwire::config::{generate_default_config, Config};
use chatwire::server::{serve, AppState};

#[derive(Parser)]
#[command(name = "chatwire-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "WebSocket chat server with broadcast and echo relay endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a default config file
    InitConfig {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::InitConfig { output }) = cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(&path, content)?;
                println!("Wrote default config to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    chatwire::logging::init(&config.logging)?;

    tracing::info!("Starting Chatwire server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_connections = config.server.max_connections,
        bot_name = %config.server.bot_name,
        duplicate_replies = config.relay.duplicate_replies,
        "Server settings"
    );

    let state = AppState::new(config.server.hub_config(), config.relay.clone());
    serve(state, &config.server.addr()).await?;

    tracing::info!("Chatwire server stopped");
    Ok(())
}

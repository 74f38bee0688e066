//! eonet - Game client transport
//!
//! Connects to a game server and keeps the session alive.

use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eonet::config::{self, Config};
use eonet::network::{Client, ClientEvent, HandshakeState};
use eonet::protocol::{self, describe};

/// eonet - Client transport for the game protocol
#[derive(Parser)]
#[command(name = "eonet")]
#[command(author = "eonet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Connect to a game server and hold the session open", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server and run the handshake
    Connect {
        /// Server host (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_layer = match &config.general.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();

    match cli.command {
        Commands::Connect { host, port } => {
            run_connect(config, host, port).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info(&config);
        }
    }

    Ok(())
}

/// Connect and hold the session until the server drops it or Ctrl+C
async fn run_connect(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.network.host.clone());
    let port = port.unwrap_or(config.network.port);

    let mut net_config = config.connect_config();
    net_config.port = port;

    tracing::info!(
        "Connecting to {}:{} as client {} (hdid {})",
        host,
        port,
        net_config.version,
        net_config.hdid
    );

    let mut client = Client::new(net_config);
    let mut event_rx = client
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;

    println!("Connecting to {}:{}...", host, port);
    client.connect_hostname(&host, port).await?;

    println!("Press Ctrl+C to disconnect.\n");

    // Main event loop
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ClientEvent::Connected { server_addr } => {
                        tracing::info!("Connected to {}, waiting for init reply", server_addr);
                    }
                    ClientEvent::Handshake { state } => {
                        match state {
                            HandshakeState::AwaitingWelcomeOrPing => {
                                let player_id = client.player_id().await.unwrap_or_default();
                                println!("+ Init accepted, player id {}", player_id);
                            }
                            HandshakeState::Ready => {
                                println!("+ Session ready");
                            }
                            HandshakeState::Failed(code) => {
                                println!("- Init rejected: {}", code);
                            }
                            other => tracing::debug!("Handshake state: {:?}", other),
                        }
                    }
                    ClientEvent::Unhandled { family, action } => {
                        tracing::debug!("No handler for {}", describe(family, action));
                    }
                    ClientEvent::Disconnected { reason } => {
                        tracing::info!("Disconnected: {}", reason);
                        println!("Disconnected: {}", reason);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    if client.is_connected().await {
        client.disconnect().await?;
    }
    tracing::info!("Client stopped");

    Ok(())
}

/// Print protocol information
fn print_protocol_info(config: &Config) {
    println!("eonet Protocol Information");
    println!("==========================\n");

    println!("Client version: {}", config.client.version());
    println!("Default port: {}", protocol::DEFAULT_PORT);
    println!("Max frame size: {} bytes", protocol::MAX_FRAME_SIZE);
    println!("Sequence period: {}", protocol::SEQUENCE_PERIOD);

    println!("\nConfiguration search path:");
    if let Some(dir) = dirs::config_dir() {
        println!("  - {}", dir.join("eonet/config.toml").display());
    }
    println!("  - ./eonet.toml");
    println!("  - ./config.toml");
}

//! CLI module for Ripple
//!
//! Provides commands:
//! - `listen`: print every notification on a channel until Ctrl-C
//! - `publish`: send one notification
//! - `doctor`: show configuration and live peers

use crate::config::{load_config, AppConfig};
use clap::{Parser, Subcommand};
use ripple_bus::Hub;
use tracing::debug;

pub mod doctor;
pub mod listen;
pub mod publish;

/// Ripple notification bus CLI
#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(about = "Content-change notification bus")]
#[command(version)]
pub struct Cli {
    /// Channel to use instead of the configured one
    #[arg(long, global = true)]
    pub channel: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print notifications as they arrive
    Listen {
        /// One JSON object per line instead of text
        #[arg(long)]
        json: bool,
    },
    /// Publish a notification
    #[command(subcommand)]
    Publish(publish::PublishCommand),
    /// Show configuration and rendezvous peers
    Doctor,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let mut config = load_config()?;
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    install_hub(&config);

    match command {
        Commands::Listen { json } => listen::run(&config, json).await,
        Commands::Publish(publish) => publish::run(&config, publish).await,
        Commands::Doctor => doctor::run(&config),
    }
}

fn install_hub(config: &AppConfig) {
    Hub::init_global(config.bus.clone());
    debug!(hub = %Hub::global().id(), channel = %config.channel, "Hub ready");
}

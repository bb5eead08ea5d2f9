use crate::config::AppConfig;
use anyhow::{Context, Result};
use ripple_bus::{Hub, CHANNEL_NAME_FILE};
use std::fs;
use std::path::Path;

pub fn run(config: &AppConfig) -> Result<()> {
    println!("🩺 Ripple Doctor\n");

    println!("Configuration:");
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    for line in rendered.lines() {
        println!("  {line}");
    }
    println!();

    let hub = Hub::global();
    match hub.transport_name() {
        Some(name) => println!("Host transport: ✅ {name}"),
        None => {
            println!("Host transport: ℹ️  disabled, channels stay in this process");
            return Ok(());
        }
    }

    let root = config.bus.resolved_rendezvous_dir();
    print!("Rendezvous directory... ");
    if !root.exists() {
        println!("ℹ️  {} (created on first subscription)", root.display());
        return Ok(());
    }
    println!("✅ {}", root.display());

    check_configured_channel(config, hub);
    list_channels(&root)
}

#[cfg(unix)]
fn check_configured_channel(config: &AppConfig, hub: &Hub) {
    use ripple_bus::UnixDatagramTransport;

    let transport = UnixDatagramTransport::new(
        config.bus.resolved_rendezvous_dir(),
        hub.id(),
        config.bus.max_payload_bytes,
    );
    print!("Listeners on '{}'... ", config.channel);
    match transport.peers(&config.channel) {
        Ok(peers) if peers.is_empty() => println!("ℹ️  none"),
        Ok(peers) => println!("✅ {}", peers.len()),
        Err(e) => println!("❌ {e}"),
    }
}

#[cfg(not(unix))]
fn check_configured_channel(_config: &AppConfig, _hub: &Hub) {}

fn list_channels(root: &Path) -> Result<()> {
    let mut channels: Vec<(String, usize)> = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let sockets = fs::read_dir(entry.path())?
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "sock"))
            .count();
        // Long names live in hashed directories, the full name is recorded beside the sockets
        let name = fs::read_to_string(entry.path().join(CHANNEL_NAME_FILE))
            .unwrap_or_else(|_| entry.file_name().to_string_lossy().into_owned());
        channels.push((name, sockets));
    }
    channels.sort();

    if channels.is_empty() {
        println!("Channels: none yet");
        return Ok(());
    }
    println!("Channels:");
    for (name, sockets) in channels {
        println!("  {name:<32} {sockets} socket(s)");
    }
    Ok(())
}

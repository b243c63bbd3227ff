//! lancast - local-network presence and broadcast hub
//!
//! Announces a service record over mDNS and fans status updates out to
//! every WebSocket client on the local network.

mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::AppConfig;
use lancast_advertise::ServiceAdvertiser;
use lancast_hub::{BroadcastHub, HubEvent};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Local-network presence and broadcast hub
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the hub listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the mDNS announcement
    #[arg(long)]
    no_advertise: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.hub.listen_port = port;
    }
    if args.no_advertise {
        config.advertise.enabled = false;
    }
    config.validate()?;

    let hub = BroadcastHub::new();
    if !hub.start_listening(config.hub.listen_port).await {
        bail!("failed to listen on port {}", config.hub.listen_port);
    }

    let mut advertiser = ServiceAdvertiser::new();
    if config.advertise.enabled {
        advertiser
            .start(
                &config.advertise.service_type,
                &config.instance_name(),
                config.advertised_port(),
                config.advertise.txt.clone(),
            )
            .context("failed to publish the service announcement")?;
    }

    // Surface hub events; message payloads belong to whatever embeds the
    // hub, so the standalone binary just logs them.
    let events = hub.event_receiver();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                HubEvent::MessageReceived {
                    connection_id,
                    text,
                } => {
                    info!(connection_id = %connection_id, message = %text, "Client message");
                }
                HubEvent::ConnectionCountChanged { count } => {
                    info!(count, "Client count changed");
                }
            }
        }
    });

    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    advertiser.stop();
    hub.shutdown().await;

    Ok(())
}

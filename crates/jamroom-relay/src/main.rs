//! jamroom-relay: WebSocket mailbox relay for mesh signaling.
//!
//! Each connection binds to one `(room, user)` inbox with a hello frame.
//! Clients append signaling messages to any inbox in their room, stream
//! their own inbox, and delete entries once delivered. Undelivered entries
//! expire after the inbox TTL.

mod connection;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use jamroom_common::JamroomError;
use jamroom_config::{toml_loader, validation, MeshConfig};
use jamroom_mesh::MemoryMailbox;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::connection::handle_connection;

#[derive(Parser)]
#[command(name = "jamroom-relay", about = "WebSocket mailbox relay for jamroom signaling")]
struct Args {
    /// Port to listen on. Overrides `relay.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds an undelivered message is kept. Overrides `relay.inbox_ttl_secs`.
    #[arg(long)]
    inbox_ttl: Option<u64>,

    /// Config file. Defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jamroom-relay: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("jamroom_relay={}", config.logging.level.as_directive()).into()
            }),
        )
        .init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Relay stopped");
        std::process::exit(1);
    }
}

fn load(args: &Args) -> Result<MeshConfig, JamroomError> {
    let mut config = match &args.config {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    if let Some(port) = args.port {
        config.relay.port = port;
    }
    if let Some(ttl) = args.inbox_ttl {
        config.relay.inbox_ttl_secs = ttl;
    }
    validation::validate(&config)?;
    Ok(config)
}

async fn run(config: MeshConfig) -> Result<(), JamroomError> {
    let store = MemoryMailbox::new();

    let addr = format!("0.0.0.0:{}", config.relay.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("jamroom-relay listening on {}", addr);

    // Spawn stale inbox reaper.
    let reaper_store = store.clone();
    let ttl = Duration::from_secs(config.relay.inbox_ttl_secs);
    let tick = ttl.min(Duration::from_secs(60));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tick).await;
            let pruned = reaper_store.prune_older_than(ttl).await;
            let inboxes = reaper_store.inbox_count().await;
            tracing::debug!(pruned, inboxes, "Reaper tick");
        }
    });

    let hello_timeout = Duration::from_secs(config.relay.hello_timeout_secs);
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = store.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, store, hello_timeout).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

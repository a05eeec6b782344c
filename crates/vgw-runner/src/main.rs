//! # vgw-runner
//!
//! Main entry point for the venue gateway.
//!
//! Loads a JSON configuration file, creates one adapter per configured venue
//! connection backed by the simulated session, and manages their lifecycle.
//! Canonical events from every adapter are drained and logged.
//!
//! # Usage
//!
//! ```bash
//! vgw-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use vgw_adapter::Adapter;
use vgw_adapter::sim::SimSession;
use vgw_core::types::{AdapterEvent, EventReceiver};

/// Venue Gateway Adapter Runner.
#[derive(Parser)]
#[command(name = "vgw-runner", about = "Venue Gateway Adapter Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    vgw_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "vgw-runner");

    info!("vgw-runner starting — config={}, log_level={}", cli.config.display(), cli.log_level,);

    // 2. Load configuration
    let config = vgw_core::config::load_config(&cli.config)?;
    info!("config loaded — {} connection(s)", config.connections.len(),);

    // 3. Create and connect one adapter per connection
    let mut adapters: Vec<Arc<Adapter<SimSession>>> = Vec::new();

    for (idx, conn_config) in config.connections.iter().enumerate() {
        let label = conn_config.module_name();
        let (adapter, rx) = Adapter::new(conn_config, SimSession::new());
        let adapter = Arc::new(adapter);

        if let Err(e) = adapter.connect() {
            error!("connection[{idx}]: connect failed for '{label}': {e}");
            continue;
        }
        info!("connection[{idx}]: adapter '{label}' connecting (venue={})", conn_config.venue,);

        tokio::spawn(drain_events(label.clone(), rx));

        if let Some(ttl) = conn_config.quote_ttl_secs {
            tokio::spawn(evict_stale_quotes(label, Arc::clone(&adapter), ttl));
        }

        adapters.push(adapter);
    }

    if adapters.is_empty() {
        anyhow::bail!("no adapter connected, nothing to run");
    }

    info!("all {} adapter(s) running — press Ctrl+C to stop", adapters.len(),);

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 5. Stop all adapters gracefully
    for adapter in &adapters {
        if let Err(e) = adapter.disconnect() {
            error!("error disconnecting: {e}");
        }
        adapter.reset();
    }

    info!("all adapters stopped — goodbye");
    Ok(())
}

/// Drain one adapter's canonical event stream into the log.
async fn drain_events(label: String, mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            AdapterEvent::Connected => info!("[{label}] connected"),
            AdapterEvent::Disconnected { error: Some(e) } => {
                warn!("[{label}] disconnected: {e}")
            }
            AdapterEvent::Disconnected { error: None } => info!("[{label}] disconnected"),
            AdapterEvent::OrderReport {
                transaction_id,
                state,
                remaining,
                error,
                ..
            } => match error {
                Some(e) => warn!("[{label}] order #{transaction_id}: {state} ({e})"),
                None => info!("[{label}] order #{transaction_id}: {state} remaining={remaining}"),
            },
            AdapterEvent::Level1Change {
                security,
                bid,
                ask,
                last,
                ..
            } => {
                info!("[{label}] level1 {security}: bid={bid:?} ask={ask:?} last={last:?}")
            }
            AdapterEvent::QuoteChange { security, bids, asks, .. } => {
                info!("[{label}] depth {security}: {} bids / {} asks", bids.len(), asks.len(),)
            }
            AdapterEvent::Candle {
                security,
                close,
                volume,
                ..
            } => {
                info!("[{label}] candle {security}: close={close} volume={volume}")
            }
            AdapterEvent::PositionChange { account, security, .. } => {
                info!("[{label}] position change account={account} security={security:?}")
            }
            AdapterEvent::SecurityInfo { security, name, .. } => {
                info!("[{label}] security {security}: {name}")
            }
            AdapterEvent::Error { message } => warn!("[{label}] {message}"),
        }
    }
    info!("[{label}] event stream closed");
}

/// Periodically evict quote groups whose end marker never arrived.
async fn evict_stale_quotes(label: String, adapter: Arc<Adapter<SimSession>>, ttl_secs: u64) {
    let ttl = Duration::from_secs(ttl_secs);
    let mut interval = tokio::time::interval(ttl);
    interval.tick().await;
    loop {
        interval.tick().await;
        let evicted = adapter.tables().quotes.evict_older_than(ttl);
        if evicted > 0 {
            warn!("[{label}] evicted {evicted} stale quote group(s)");
        }
    }
}

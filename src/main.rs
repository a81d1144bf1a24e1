//! proxy-relay daemon.
//!
//! ```text
//!   local clients ──▶ sing-box (socks-<port> inbound) ──▶ upstream-<port> ──▶ upstream proxy
//!                            ▲
//!                            │ rendered config + reload
//!   ┌────────────────────────┴──────────────────────────────────────────┐
//!   │ proxy-relay                                                       │
//!   │   PortMonitor ──probe──▶ upstream ── N failures ──▶ Failover       │
//!   │   Failover ──▶ provider API ──▶ save TOML ──▶ apply ──▶ swap live  │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use proxy_relay::config::{ConfigStore, TomlConfigStore};
use proxy_relay::lifecycle::signals::wait_for_signal;
use proxy_relay::observability::{logging, metrics};
use proxy_relay::Relay;

#[derive(Parser)]
#[command(name = "proxy-relay")]
#[command(about = "Keeps local proxy ports bound to healthy upstreams", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/relay.toml")]
    config: PathBuf,

    /// Do not push the rendered configuration to the engine at startup
    #[arg(long)]
    no_apply: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = TomlConfigStore::new(&cli.config);
    let config = store
        .load()
        .with_context(|| format!("failed to load {}", store.path().display()))?;

    if cli.check {
        println!(
            "{}: OK ({} ports, {} providers)",
            store.path().display(),
            config.ports.len(),
            config.providers.len()
        );
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "proxy-relay starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        ports = config.ports.len(),
        providers = config.providers.len(),
        check_interval_secs = config.monitoring.check_interval_secs,
        failure_threshold = config.monitoring.failure_threshold,
        "Configuration loaded"
    );

    let relay = Relay::bootstrap(&cli.config, config)?;

    if cli.no_apply {
        tracing::info!("Skipping initial engine apply");
    } else {
        relay.apply_current().await?;
    }

    let started = relay.monitor.start_enabled().await;
    tracing::info!(ports = ?started, "Monitors running");

    let _watcher = match relay.watch_config() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    wait_for_signal().await;

    relay.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

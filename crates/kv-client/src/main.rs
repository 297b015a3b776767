//! klipper-voice client daemon
//!
//! Keeps a connection to the printer's Moonraker host and logs what it
//! sees. SIGHUP re-reads the config file; Ctrl+C or SIGTERM shut down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_client::KlipperClient;
use kv_core::config::{self, ConfigProvider, SharedConfig};
use kv_core::{CompletionState, PrintState};

/// How often the built-in observer polls the facade
const OBSERVER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "kv-client")]
#[command(about = "klipper-voice client - follows a Klipper printer through Moonraker")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "KV_CONFIG")]
    config: Option<PathBuf>,

    /// Moonraker host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("klipper-voice client starting...");

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let shared = SharedConfig::from_file_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let overrides = Overrides { host: args.host };
    let mut overridden = shared.snapshot();
    overrides.apply(&mut overridden);
    shared.replace(overridden);
    let shared = Arc::new(shared);

    let client = KlipperClient::new(shared.clone());
    client.start();

    let cancel = CancellationToken::new();
    let observer = tokio::spawn(observe(client.clone(), cancel.clone()));

    wait_for_shutdown(&client, &shared, &overrides).await?;

    cancel.cancel();
    client.stop().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), observer).await;

    tracing::info!("klipper-voice client stopped");
    Ok(())
}

/// Command-line settings that take precedence over the config file
struct Overrides {
    host: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut config::ClientConfig) {
        if let Some(host) = &self.host {
            config.klipper.host = Some(host.clone());
        }
    }
}

/// Serve reload signals until a shutdown signal arrives
async fn wait_for_shutdown(
    client: &KlipperClient,
    shared: &Arc<SharedConfig>,
    overrides: &Overrides,
) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        let mut hangup =
            signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down...");
                    return Ok(());
                }
                _ = terminate.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    return Ok(());
                }
                _ = hangup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    reload(client, shared, overrides);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (client, shared, overrides);
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        tracing::info!("Received Ctrl+C, shutting down...");
        Ok(())
    }
}

/// Re-read the config file and reconnect if the connection settings changed
#[cfg_attr(not(unix), allow(dead_code))]
fn reload(client: &KlipperClient, shared: &SharedConfig, overrides: &Overrides) {
    match shared.reload_with(|config| overrides.apply(config)) {
        Ok(changed) if changed.requires_reconnect() => {
            let client = client.clone();
            tokio::spawn(async move {
                if !client.reconfigure().await {
                    tracing::warn!("Reconfigure skipped, another one is in progress");
                }
            });
        }
        Ok(changed) if changed.any() => {
            tracing::info!("Response templates updated");
        }
        Ok(_) => tracing::info!("Configuration unchanged"),
        Err(e) => tracing::error!("Failed to reload configuration: {}", e),
    }
}

/// Stand-in for the voice notifiers: log what they would announce
async fn observe(client: KlipperClient, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(OBSERVER_INTERVAL);
    let mut last_state = PrintState::Unknown;
    let mut last_completion = CompletionState::Pending;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let status = client.snapshot();
        if status.print_state != last_state {
            tracing::info!("Printer is {}", status.print_state);
            last_state = status.print_state;
        }
        if status.completion_state != last_completion {
            match status.completion_state {
                CompletionState::Complete => tracing::info!(
                    "Print finished: {}",
                    status.filename.as_deref().unwrap_or("unknown file")
                ),
                CompletionState::Cancelled => tracing::info!("Print cancelled"),
                CompletionState::Pending => {}
            }
            last_completion = status.completion_state;
        }

        if status.print_state == PrintState::Printing
            && status.progress_percent > 0
            && !client.is_announced()
        {
            tracing::info!(
                "Estimated time remaining: {:?} ({}%)",
                status.remaining_time,
                status.progress_percent
            );
            client.set_announced(true);
        }

        while let Some(text) = client.pending_response() {
            tracing::info!("Printer says: {}", text);
            client.clear_response();
        }

        for notice in client.lifecycle().raised() {
            tracing::info!("Lifecycle notice: {}", notice.method());
            client.acknowledge(notice);
        }
    }
}

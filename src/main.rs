//! Permit Watch - recreation.gov permit availability monitor
//!
//! Polls the recreation.gov availability API for a set of river permits,
//! announces newly opened dates on a Telegram channel, and takes
//! /monitor-style commands from that channel to change what is watched.

mod common;
mod config;
mod monitor;
mod recreation;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use config::{env::get_config_path, load_and_validate};
use monitor::{AvailabilityPoller, AvailabilityStore, Notification, Notifier, PermitRegistry};
use recreation::{DivisionDiscovery, RecreationClient};
use telegram::{CommandProcessor, TelegramClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Permit Watch v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!(
            "Set RECREATION_API_KEY, TELEGRAM_BOT_TOKEN and TELEGRAM_CHANNEL_ID, or provide {}.",
            config_path
        );
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Check interval: {}s", config.monitor.check_interval_secs);
    info!("  Data directory: {}", config.monitor.data_dir.display());
    info!("  Telegram channel: {}", config.telegram.channel_id);
    info!("  Lookahead: {} days", config.recreation.lookahead_days);

    // ============================================================
    // Clients and shared state
    // ============================================================
    let source = Arc::new(RecreationClient::new(&config.recreation)?);
    let messenger = Arc::new(TelegramClient::new(&config.telegram)?);

    let registry = Arc::new(RwLock::new(
        PermitRegistry::load(config.monitor.registry_path()).await,
    ));
    let store = Arc::new(Mutex::new(AvailabilityStore::load(
        config.monitor.state_path(),
    )));

    let notifier = Arc::new(Notifier::new(
        messenger.clone(),
        config.telegram.channel_id.clone(),
    ));

    let interval = Duration::from_secs(config.monitor.check_interval_secs);
    let startup = Notification::Startup {
        permits: registry.read().await.list(),
        interval,
    };
    if let Err(e) = notifier.notify(&startup).await {
        warn!("Startup message not delivered: {}", e);
    }

    // ============================================================
    // Spawn the poller and the command processor
    // ============================================================
    let poller = AvailabilityPoller::new(
        source.clone(),
        registry.clone(),
        store.clone(),
        notifier.clone(),
        interval,
    );
    let mut poller_task = tokio::spawn(poller.run());

    let processor = CommandProcessor::new(
        messenger,
        notifier,
        DivisionDiscovery::new(source, &config.discovery),
        registry,
        store,
        config.telegram.channel_id.clone(),
        Duration::from_secs(config.telegram.command_poll_secs),
    );
    let mut command_task = tokio::spawn(processor.run());

    info!("Monitoring started");

    tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        result = &mut poller_task => {
            error!("Availability poller stopped unexpectedly: {:?}", result);
        }
        result = &mut command_task => {
            error!("Command processor stopped unexpectedly: {:?}", result);
        }
    }

    // State is written on every change, so nothing is left to flush.
    poller_task.abort();
    command_task.abort();

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

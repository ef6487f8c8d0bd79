//! # hearthd — hearth daemon
//!
//! Composition root that wires the device manager, the settings store,
//! and the loaded plugins together, then runs the dispatcher loop.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Open the settings store and construct the device manager
//! - Register plugins through the loader port
//! - Load configured devices, start auto-device monitoring, announce `Loaded`
//! - Run the dispatcher loop (plugin signals, timer, rule evaluation)
//! - Handle graceful shutdown (SIGTERM/SIGINT); devices drop before plugins
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use hearth_core::manager::DeviceManager;
use hearth_core::rules::RuleEngine;
use hearth_core::runtime;
use hearth_plugin_virtual::VirtualPluginProvider;
use hearth_settings_file::FileSettings;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration
    let config = Config::load()?;

    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    tracing::info!("configuration loaded");

    // Settings store
    let settings = FileSettings::open(&config.settings.path)?;
    tracing::info!(path = %config.settings.path, "settings store ready");

    // Device manager and plugins
    let (mut manager, mut signals) = DeviceManager::new(config.manager_config(), settings);
    manager.register_plugins(&mut VirtualPluginProvider::new());
    manager.load_configured_devices();
    manager.start_monitoring_auto_devices();
    manager.announce_loaded();
    tracing::info!(
        plugins = manager.supported_vendors().len(),
        devices = manager.configured_devices().len(),
        "device manager ready"
    );

    // Notification logger — stands in for the JSON-RPC layer.
    let mut notifications = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => tracing::info!(?notification, "notification"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "notification subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Dispatcher loop
    let mut rules = RuleEngine::new();
    runtime::run(&mut manager, &mut signals, &mut rules, shutdown_signal()).await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => {
                tracing::warn!("failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

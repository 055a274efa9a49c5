//! Bridgekeeper - conditional message relay between Discord channels
//!
//! Watches source channels and forwards every message that satisfies one of
//! a bridge's conditions to the bridge's destination channel, in any guild
//! the bot is a member of.

mod bridge;
mod common;
mod config;
mod discord;
mod store;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use bridge::Router;
use config::{env::get_config_path, load_and_validate};
use discord::{BridgeHandler, CommandHandler, DiscordBotBuilder, DiscordTransport};
use store::SqliteRuleStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Bridgekeeper v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Database: {}", config.database.path);
    info!("  Command prefix: {}", config.discord.command_prefix);
    if config.discord.owner_ids.is_empty() {
        warn!("No owner_ids configured - administrative commands are disabled");
    }

    // ============================================================
    // Open rule store and build the router
    // ============================================================
    let store = SqliteRuleStore::open(&config.database.path).await?;
    let transport = Arc::new(DiscordTransport::new());
    let router = Arc::new(Router::new(Arc::new(store), transport.clone()));

    let monitored = router.rebuild_cache().await?;
    info!("Loaded bridges for {} source channels", monitored);

    // ============================================================
    // Start Discord bot
    // ============================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let commands = CommandHandler::new(
        config.discord.command_prefix.clone(),
        config.discord.owner_ids.iter().copied(),
        router.clone(),
    );
    let handler = BridgeHandler::new(router, transport, commands, config.discord.status.clone());

    let discord_bot = DiscordBotBuilder::new(config.discord.token.clone(), handler, shutdown_rx)
        .build()
        .await?;

    info!("Starting Discord bot...");
    let mut discord_task = tokio::spawn(async move {
        discord_bot.run().await;
    });

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - disconnecting...");
            true
        }
        _ = &mut discord_task => false,
    };

    // Handle graceful shutdown
    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (Discord task already exited): {}", e);
        }
        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, discord_task).await {
            Ok(Ok(())) => info!("Discord client shut down gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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

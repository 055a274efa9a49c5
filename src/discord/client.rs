//! Discord bot client abstraction.
//!
//! Provides a high-level interface for creating and running the Discord bot,
//! hiding serenity implementation details from the rest of the application.

use std::time::Duration;

use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;

use backon::BackoffBuilder;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::discord::handler::BridgeHandler;

/// Longest wait between reconnection attempts.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Message received.
    Message {
        context: Context,
        message: serenity::model::channel::Message,
    },
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }

    fn forward(&self, event: DiscordBotEvent) {
        if let Err(error) = self.discord_events_tx.send(event) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        self.forward(DiscordBotEvent::Ready { context, ready });
    }

    async fn message(&self, context: Context, message: serenity::model::channel::Message) {
        self.forward(DiscordBotEvent::Message { context, message });
    }
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    token: String,
    handler: BridgeHandler,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBotBuilder {
    /// Create a new Discord bot builder.
    pub fn new(token: String, handler: BridgeHandler, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            token,
            handler,
            shutdown_rx,
        }
    }

    /// Build the Discord bot.
    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();

        let client = build_client(&self.token, discord_events_tx.clone()).await?;

        Ok(DiscordBot {
            client: Some(client),
            token: self.token,
            handler: self.handler,
            discord_events_rx,
            discord_events_tx,
            shutdown_rx: self.shutdown_rx,
        })
    }
}

async fn build_client(
    token: &str,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> anyhow::Result<Client> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// Create an exponential backoff iterator for Discord reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    handler: BridgeHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    pub async fn run(mut self) {
        // Extract shard manager before we move client into run_connection
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let client = &mut self.client;
        let discord_events_rx = &mut self.discord_events_rx;
        let handler = &self.handler;
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::select! {
            _ = Self::run_connection(client, &self.token, &self.discord_events_tx) => {},
            _ = Self::process_events(discord_events_rx, handler, &mut self.shutdown_rx) => {},
            _ = async {
                // Wait for shutdown signal
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                // Gracefully shutdown Discord gateway
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
    ) {
        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => {
                    // serenity mostly handles reconnections itself.
                    match build_client(token, discord_events_tx.clone()).await {
                        Ok(client) => {
                            backoff = discord_backoff();
                            client
                        }
                        Err(e) => {
                            error!("Failed to rebuild Discord client: {}", e);
                            let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                            warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
            };

            let result = client.start().await;
            if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                warn!("Failed to process discord event: {}", error);
            }

            match result {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        handler: &BridgeHandler,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = discord_events_rx.recv() => {
                    match event {
                        Some(DiscordBotEvent::Ready { context, ready }) => {
                            handler.handle_ready(context, ready).await;
                        }
                        Some(DiscordBotEvent::Message { context, message }) => {
                            handler.handle_message(context, message).await;
                        }
                        Some(DiscordBotEvent::Disconnected) => {
                            debug!("Discord session closed");
                        }
                        None => {
                            debug!("Discord events channel closed.");
                            break;
                        }
                    }
                }

                // Shutdown signal
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event processing");
                        break;
                    }
                }
            }
        }
    }
}

//! Discord message event handling.
//!
//! Turns gateway events into router calls: `ready` binds the transport and
//! reloads the cache, `message` either runs an admin command or relays.

use std::sync::Arc;

use serenity::cache::Cache;
use serenity::gateway::ActivityData;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::bridge::Router;
use crate::common::{Endpoint, InboundMessage};
use crate::discord::commands::CommandHandler;
use crate::discord::transport::{is_text_channel, DiscordTransport};

/// Presence text used when none is configured.
const DEFAULT_STATUS: &str = "your content";

/// Discord event handler.
pub struct BridgeHandler {
    router: Arc<Router>,
    transport: Arc<DiscordTransport>,
    commands: CommandHandler,
    status: String,
}

impl BridgeHandler {
    pub fn new(
        router: Arc<Router>,
        transport: Arc<DiscordTransport>,
        commands: CommandHandler,
        status: Option<String>,
    ) -> Self {
        Self {
            router,
            transport,
            commands,
            status: status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        }
    }

    pub async fn handle_ready(&self, ctx: Context, ready: Ready) {
        info!(
            "Discord bot connected as {} ({} guilds)",
            ready.user.name,
            ready.guilds.len()
        );

        self.transport.attach(&ctx);
        ctx.set_activity(Some(ActivityData::watching(self.status.clone())));

        match self.router.rebuild_cache().await {
            Ok(count) => info!("Monitoring {} source channels", count),
            Err(e) => error!("Failed to rebuild endpoint cache: {}", e),
        }
    }

    /// Cheap admission check, done before touching the gateway cache.
    fn is_monitored(&self, channel_id: ChannelId) -> bool {
        self.router.cache().contains(channel_id.get())
    }

    pub async fn handle_message(&self, ctx: Context, msg: Message) {
        // Only handle guild (server) messages
        if msg.guild_id.is_none() {
            return;
        }

        let content = msg.content.trim();
        if content.starts_with(self.commands.prefix()) && !msg.author.bot {
            match self.commands.handle_command(&ctx, &msg, content).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    error!("Command handler error: {}", e);
                    return;
                }
            }
        }

        if !self.is_monitored(msg.channel_id) {
            return;
        }

        let Some(inbound) = inbound_message(&ctx.cache, &msg) else {
            debug!("Ignoring message in unresolvable channel {}", msg.channel_id);
            return;
        };

        let report = self.router.dispatch(&inbound).await;
        if report.failed() > 0 {
            warn!(
                source = %inbound.source,
                "Relayed to {} destinations, {} failed",
                report.delivered(),
                report.failed()
            );
        } else if report.delivered() > 0 {
            debug!(source = %inbound.source, "Relayed to {} destinations", report.delivered());
        }
    }
}

/// Build the platform-independent view of a guild text message.
///
/// Returns `None` for DMs, threads, voice chats and anything not in the cache.
fn inbound_message(cache: &Cache, msg: &Message) -> Option<InboundMessage> {
    let guild_id = msg.guild_id?;
    let (guild_name, channel_name) = {
        let guild = cache.guild(guild_id)?;
        let channel = guild
            .channels
            .get(&msg.channel_id)
            .filter(|c| is_text_channel(c.kind))?;
        (guild.name.clone(), channel.name.clone())
    };

    let author_name = msg.member.as_ref().map(|member| {
        display_name(
            member.nick.as_deref(),
            msg.author.global_name.as_deref(),
            &msg.author.name,
        )
    });

    Some(InboundMessage {
        author_id: msg.author.id.get(),
        author_name,
        is_self: msg.author.id == cache.current_user().id,
        source: Endpoint::new(guild_id.get(), msg.channel_id.get()),
        guild_name,
        channel_name,
        text: msg.content.clone(),
    })
}

/// Guild nickname, then global display name, then user name.
fn display_name(nick: Option<&str>, global_name: Option<&str>, name: &str) -> String {
    nick.or(global_name).unwrap_or(name).to_string()
}

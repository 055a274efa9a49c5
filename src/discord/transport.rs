//! Serenity-backed [`Transport`].
//!
//! The gateway session only exists once the client has connected, so the
//! transport starts detached and is attached on every `ready` event.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serenity::builder::{CreateAllowedMentions, CreateMessage};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::Context;
use tracing::debug;

use crate::bridge::mentions::{MentionKind, MentionPolicy};
use crate::bridge::transport::Transport;
use crate::common::error::{DispatchError, DispatchResult};
use crate::common::{Endpoint, ResolvedEndpoint};

#[derive(Clone)]
struct Handles {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

/// Delivers relayed messages through the live serenity session.
#[derive(Default)]
pub struct DiscordTransport {
    handles: RwLock<Option<Handles>>,
}

impl DiscordTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the transport to the session of a freshly connected client.
    pub fn attach(&self, ctx: &Context) {
        let handles = Handles {
            cache: ctx.cache.clone(),
            http: ctx.http.clone(),
        };
        *self.handles.write().unwrap_or_else(PoisonError::into_inner) = Some(handles);
    }

    fn handles(&self) -> DispatchResult<Handles> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::NotConnected)
    }
}

/// Whether a channel can carry relayed messages.
pub fn is_text_channel(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::Text | ChannelType::News)
}

/// Look an endpoint up in the gateway cache.
pub fn resolve_in_cache(cache: &Cache, endpoint: Endpoint) -> DispatchResult<ResolvedEndpoint> {
    let guild_not_found = DispatchError::GuildNotFound {
        guild_id: endpoint.guild_id,
    };
    if endpoint.guild_id == 0 {
        return Err(guild_not_found);
    }
    let guild = cache
        .guild(GuildId::new(endpoint.guild_id))
        .ok_or(guild_not_found)?;

    let channel = (endpoint.channel_id != 0)
        .then(|| guild.channels.get(&ChannelId::new(endpoint.channel_id)))
        .flatten()
        .filter(|channel| is_text_channel(channel.kind))
        .ok_or_else(|| DispatchError::ChannelNotFound {
            guild_name: guild.name.clone(),
            channel_id: endpoint.channel_id,
        })?;

    Ok(ResolvedEndpoint {
        endpoint,
        guild_name: guild.name.clone(),
        channel_name: channel.name.clone(),
    })
}

/// Translate a mention policy into Discord's allowed-mentions payload.
pub fn allowed_mentions(policy: &MentionPolicy) -> CreateAllowedMentions {
    CreateAllowedMentions::new()
        .everyone(policy.allows(MentionKind::Everyone))
        .all_roles(policy.allows(MentionKind::Roles))
        .all_users(policy.allows(MentionKind::Users))
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn resolve(&self, endpoint: Endpoint) -> DispatchResult<ResolvedEndpoint> {
        let handles = self.handles()?;
        resolve_in_cache(&handles.cache, endpoint)
    }

    async fn send(
        &self,
        destination: &ResolvedEndpoint,
        content: &str,
        mentions: &MentionPolicy,
    ) -> DispatchResult<()> {
        let handles = self.handles()?;
        let channel_id = destination.endpoint.channel_id;
        if channel_id == 0 {
            return Err(DispatchError::ChannelNotFound {
                guild_name: destination.guild_name.clone(),
                channel_id,
            });
        }

        let message = CreateMessage::new()
            .content(content)
            .allowed_mentions(allowed_mentions(mentions));

        ChannelId::new(channel_id)
            .send_message(&handles.http, message)
            .await
            .map_err(|e| DispatchError::SendFailed {
                channel_id,
                message: e.to_string(),
            })?;

        debug!(destination = %destination.endpoint, "Sent {} chars", content.chars().count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_transport_is_not_connected() {
        let transport = DiscordTransport::new();
        let destination = ResolvedEndpoint {
            endpoint: Endpoint::new(1, 2),
            guild_name: "Tavern".to_string(),
            channel_name: "general".to_string(),
        };

        assert_eq!(
            tokio_test::block_on(transport.resolve(Endpoint::new(1, 2))),
            Err(DispatchError::NotConnected)
        );
        assert_eq!(
            tokio_test::block_on(transport.send(&destination, "hi", &MentionPolicy::none())),
            Err(DispatchError::NotConnected)
        );
    }

    #[test]
    fn test_unknown_guild() {
        let cache = Cache::new();

        assert_eq!(
            resolve_in_cache(&cache, Endpoint::new(42, 7)),
            Err(DispatchError::GuildNotFound { guild_id: 42 })
        );
        assert_eq!(
            resolve_in_cache(&cache, Endpoint::new(0, 7)),
            Err(DispatchError::GuildNotFound { guild_id: 0 })
        );
    }

    #[test]
    fn test_text_channel_kinds() {
        assert!(is_text_channel(ChannelType::Text));
        assert!(is_text_channel(ChannelType::News));
        assert!(!is_text_channel(ChannelType::Voice));
        assert!(!is_text_channel(ChannelType::Category));
        assert!(!is_text_channel(ChannelType::PublicThread));
    }
}

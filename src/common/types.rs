//! Shared types used across the application.

use std::fmt;

/// Discord snowflake id.
pub type Snowflake = u64;

/// A channel within a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
}

impl Endpoint {
    pub fn new(guild_id: Snowflake, channel_id: Snowflake) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// An endpoint the transport has confirmed to be reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub guild_name: String,
    pub channel_name: String,
}

/// A message that arrived on a (possibly monitored) channel.
///
/// Platform-independent: the Discord handler builds one of these per
/// `message` event and hands it to the router.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: Snowflake,
    /// Display name of the posting guild member, `None` for webhooks.
    pub author_name: Option<String>,
    /// Whether this bot authored the message itself.
    pub is_self: bool,
    pub source: Endpoint,
    pub guild_name: String,
    pub channel_name: String,
    pub text: String,
}

//! Text formatting for relayed messages and bridge listings.

use crate::common::{InboundMessage, ResolvedEndpoint};

/// Author label used when the message has no guild member (webhooks).
const WEBHOOK_AUTHOR: &str = "WebHook";

/// Format a relayed message: bold author, then source, then the original text.
pub fn format_relay(message: &InboundMessage) -> String {
    format!(
        "**{}** (`{}#{}`):\n{}",
        message.author_name.as_deref().unwrap_or(WEBHOOK_AUTHOR),
        message.guild_name,
        message.channel_name,
        message.text
    )
}

/// Short `Guild #channel` label for listings.
pub fn endpoint_label(endpoint: &ResolvedEndpoint) -> String {
    format!("`{}` `#{}`", endpoint.guild_name, endpoint.channel_name)
}

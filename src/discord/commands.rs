//! Administrative prefix commands (!createbridge, !listbridges, etc).
//!
//! Handles command parsing and execution. Only configured owners may run them.

use std::collections::HashSet;
use std::sync::Arc;

use serenity::cache::Cache;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::*;
use tracing::{debug, info, warn};

use crate::bridge::chunk::{chunk, MAX_MESSAGE_LENGTH};
use crate::bridge::condition::{Attribute, Condition};
use crate::bridge::format::endpoint_label;
use crate::bridge::mentions::{MentionKind, MentionPolicy};
use crate::bridge::Router;
use crate::common::error::ConditionError;
use crate::common::{Endpoint, Snowflake};
use crate::discord::transport::is_text_channel;
use crate::store::{BridgeRule, NewBridge};

const NOT_ALLOWED: &str = "You are not allowed to use this command!";

/// Command handler for Discord bot.
pub struct CommandHandler {
    prefix: String,
    owner_ids: HashSet<Snowflake>,
    router: Arc<Router>,
}

impl CommandHandler {
    pub fn new(prefix: String, owner_ids: impl IntoIterator<Item = Snowflake>, router: Arc<Router>) -> Self {
        Self {
            prefix,
            owner_ids: owner_ids.into_iter().collect(),
            router,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parse and execute a command from Discord.
    ///
    /// Returns `true` if the message was a command, `false` otherwise.
    pub async fn handle_command(
        &self,
        ctx: &Context,
        msg: &Message,
        content: &str,
    ) -> anyhow::Result<bool> {
        let Some(rest) = content.strip_prefix(self.prefix.as_str()) else {
            return Ok(false);
        };

        let args = split_args(rest);
        let Some(command) = args.first().map(|c| c.to_lowercase()) else {
            return Ok(false);
        };
        let args = &args[1..];

        if !matches!(
            command.as_str(),
            "createbridge" | "removebridge" | "listbridges" | "listservers" | "help"
        ) {
            return Ok(false);
        }

        debug!("Processing command: {} with args: {:?}", command, args);

        if !self.owner_ids.contains(&msg.author.id.get()) {
            warn!("Refused {} from {} ({})", command, msg.author.name, msg.author.id);
            reply(ctx, msg, NOT_ALLOWED).await?;
            return Ok(true);
        }

        let response = match command.as_str() {
            "createbridge" => self.handle_create(&ctx.cache, args).await,
            "removebridge" => self.handle_remove(args).await,
            "listbridges" => self.handle_list_bridges().await,
            "listservers" => list_servers(&ctx.cache),
            _ => help_text(&self.prefix),
        };

        reply(ctx, msg, &response).await?;
        Ok(true)
    }

    /// Handle !createbridge.
    async fn handle_create(&self, cache: &Cache, args: &[String]) -> String {
        if args.len() < 5 {
            return format!(
                "Usage: `{}createbridge <source-server> <source-channel> <destination-server> <destination-channel> <attribute:regex[;attribute:regex...]> [mentions...]`",
                self.prefix
            );
        }

        let (source, source_label) = match find_endpoint(cache, &args[0], &args[1]) {
            Ok(found) => found,
            Err(e) => return e,
        };
        let (destination, destination_label) = match find_endpoint(cache, &args[2], &args[3]) {
            Ok(found) => found,
            Err(e) => return e,
        };

        let conditions = match parse_conditions(&args[4]) {
            Ok(conditions) if !conditions.is_empty() => conditions,
            Ok(_) => return "At least one condition is required.".to_string(),
            Err(e) => {
                return format!("Invalid condition: {}. Valid attributes: {}", e, Attribute::codes())
            }
        };

        let mentions = match parse_mentions(&args[5..]) {
            Ok(mentions) => mentions,
            Err(name) => {
                return format!("Unknown mention type `{}`. Valid types: everyone, roles, users", name)
            }
        };

        let description = describe_conditions(&conditions);
        let bridge = NewBridge {
            source,
            destination,
            conditions,
            mentions: mentions.clone(),
        };

        match self.router.create_bridge(bridge).await {
            Ok(bridge_id) => format!(
                "Created bridge {} for {} → {} on condition {} (mentions: {})",
                bridge_id, source_label, destination_label, description, mentions
            ),
            Err(e) => {
                warn!("Failed to create bridge: {}", e);
                format!("Could not create bridge: {}", e)
            }
        }
    }

    /// Handle !removebridge.
    async fn handle_remove(&self, args: &[String]) -> String {
        let Some(bridge_id) = args.first().and_then(|id| id.parse::<i64>().ok()) else {
            return format!("Usage: `{}removebridge <bridge-id>`", self.prefix);
        };

        match self.router.remove_bridge(bridge_id).await {
            Ok(true) => format!("Removed bridge {}", bridge_id),
            Ok(false) => format!("There is no bridge with id {}", bridge_id),
            Err(e) => {
                warn!(bridge_id, "Failed to remove bridge: {}", e);
                format!("Could not remove bridge {}: {}", bridge_id, e)
            }
        }
    }

    /// Handle !listbridges.
    async fn handle_list_bridges(&self) -> String {
        let rules = match self.router.bridges().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Failed to list bridges: {}", e);
                return format!("Could not load bridges: {}", e);
            }
        };

        if rules.is_empty() {
            return "No bridges configured.".to_string();
        }

        let mut lines = Vec::new();
        for bridge in group_rules(&rules) {
            let first = bridge[0];
            let source = self.label(first.source).await;
            let destination = self.label(first.destination).await;
            let conditions: Vec<String> = bridge
                .iter()
                .map(|rule| format!("`{}:{}`", rule.attribute, rule.regex))
                .collect();

            lines.push(format!(
                "`{}`: {} → {} when {} (mentions: {})",
                first.bridge_id,
                source,
                destination,
                conditions.join(" or "),
                first.mentions
            ));
        }
        lines.join("\n")
    }

    async fn label(&self, endpoint: Endpoint) -> String {
        match self.router.describe(endpoint).await {
            Ok(resolved) => endpoint_label(&resolved),
            Err(_) => "INVALID".to_string(),
        }
    }
}

/// Send a possibly long response in as many messages as needed.
async fn reply(ctx: &Context, msg: &Message, text: &str) -> anyhow::Result<()> {
    for part in chunk(text, MAX_MESSAGE_LENGTH) {
        msg.channel_id.say(&ctx.http, part).await?;
    }
    Ok(())
}

/// Split a command line on whitespace, keeping double-quoted runs together.
///
/// An unterminated quote extends to the end of the input.
pub fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_arg = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_arg = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_arg {
                    args.push(std::mem::take(&mut current));
                    has_arg = false;
                }
            }
            c => {
                current.push(c);
                has_arg = true;
            }
        }
    }
    if has_arg {
        args.push(current);
    }
    args
}

/// Parse `attribute:regex` conditions separated by `;`.
pub fn parse_conditions(input: &str) -> Result<Vec<Condition>, ConditionError> {
    input
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let condition: Condition = s.parse()?;
            condition.compile()?;
            Ok(condition)
        })
        .collect()
}

/// Parse mention names. Returns the first unknown name as the error.
pub fn parse_mentions(names: &[String]) -> Result<MentionPolicy, String> {
    let names: Vec<&str> = names
        .iter()
        .flat_map(|n| n.split(','))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();

    if let Some(unknown) = names.iter().find(|n| MentionKind::parse(n).is_none()) {
        return Err(unknown.to_string());
    }
    Ok(MentionPolicy::from_names(names))
}

fn describe_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(|c| format!("`{}`", c))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Group consecutive rules of the same bridge.
pub fn group_rules(rules: &[BridgeRule]) -> Vec<Vec<&BridgeRule>> {
    let mut groups: Vec<Vec<&BridgeRule>> = Vec::new();
    for rule in rules {
        match groups.last_mut() {
            Some(group) if group[0].bridge_id == rule.bridge_id => group.push(rule),
            _ => groups.push(vec![rule]),
        }
    }
    groups
}

/// Parse a snowflake, also accepting `<#id>` channel mentions.
fn parse_snowflake(query: &str) -> Option<Snowflake> {
    query
        .trim_start_matches("<#")
        .trim_end_matches('>')
        .parse::<Snowflake>()
        .ok()
        .filter(|id| *id != 0)
}

/// Find a guild by id or exact name.
fn find_guild(cache: &Cache, query: &str) -> Option<(GuildId, String)> {
    if let Some(id) = parse_snowflake(query) {
        if let Some(guild) = cache.guild(GuildId::new(id)) {
            return Some((guild.id, guild.name.clone()));
        }
    }
    cache.guilds().into_iter().find_map(|id| {
        let guild = cache.guild(id)?;
        (guild.name == query).then(|| (guild.id, guild.name.clone()))
    })
}

/// Find a text channel of a guild by id or exact name.
fn find_text_channel(cache: &Cache, guild_id: GuildId, query: &str) -> Option<(ChannelId, String)> {
    let guild = cache.guild(guild_id)?;
    let by_id = parse_snowflake(query).and_then(|id| guild.channels.get(&ChannelId::new(id)));
    let name = query.trim_start_matches('#');

    by_id
        .or_else(|| guild.channels.values().find(|c| c.name == name))
        .filter(|c| is_text_channel(c.kind))
        .map(|c| (c.id, c.name.clone()))
}

/// Resolve a server/channel pair, returning its endpoint and display label.
fn find_endpoint(cache: &Cache, server: &str, channel: &str) -> Result<(Endpoint, String), String> {
    let (guild_id, guild_name) =
        find_guild(cache, server).ok_or_else(|| format!("Unknown server `{}`", server))?;
    let (channel_id, channel_name) = find_text_channel(cache, guild_id, channel)
        .ok_or_else(|| format!("No text channel `{}` in `{}`", channel, guild_name))?;

    Ok((
        Endpoint::new(guild_id.get(), channel_id.get()),
        format!("`{}#{}`", guild_name, channel_name),
    ))
}

/// Handle !listservers.
fn list_servers(cache: &Cache) -> String {
    let guilds: Vec<(Snowflake, String)> = cache
        .guilds()
        .into_iter()
        .filter_map(|id| cache.guild(id).map(|g| (id.get(), g.name.clone())))
        .collect();
    info!("Listing {} servers", guilds.len());
    format_server_list(guilds)
}

pub fn format_server_list(mut guilds: Vec<(Snowflake, String)>) -> String {
    if guilds.is_empty() {
        return "Not a member of any server.".to_string();
    }
    guilds.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    guilds
        .iter()
        .enumerate()
        .map(|(n, (id, name))| format!("`{}`: {} ({})", n, name, id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Handle !help.
fn help_text(prefix: &str) -> String {
    format!(
        r#"**Available Commands:**
• `{p}createbridge <source-server> <source-channel> <destination-server> <destination-channel> <attribute:regex> [mentions...]` - Relay matching messages
• `{p}removebridge <bridge-id>` - Delete a bridge
• `{p}listbridges` - Show all bridges
• `{p}listservers` - Show the servers the bot is in
• `{p}help` - Show this help message

Attributes: {attributes}. Separate several conditions with `;`, any one of them triggers the bridge.
Mentions: everyone, roles, users (default: none)."#,
        p = prefix,
        attributes = Attribute::codes()
    )
}

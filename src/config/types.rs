//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Users allowed to run administrative commands.
    #[serde(default)]
    pub owner_ids: Vec<u64>,
    /// Presence text shown as "Watching ...".
    pub status: Option<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

/// Rule store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_database_path() -> String {
    "bridgekeeper.db".to_string()
}

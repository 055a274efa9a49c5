//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `BRIDGEKEEPER_DISCORD_TOKEN` - Discord bot token
//! - `BRIDGEKEEPER_OWNER_IDS` - comma separated owner user ids
//! - `BRIDGEKEEPER_DATABASE_PATH` - SQLite database file

use std::env;

use tracing::warn;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "BRIDGEKEEPER";

/// Apply environment variable overrides to a config.
///
/// This allows the token to be provided via the environment instead of
/// the config file.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// Apply overrides using an arbitrary variable lookup.
fn apply_overrides_from(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(token) = lookup(&format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Some(ids) = lookup(&format!("{}_OWNER_IDS", ENV_PREFIX)) {
        let parsed: Result<Vec<u64>, _> = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect();
        match parsed {
            Ok(owner_ids) => config.discord.owner_ids = owner_ids,
            Err(e) => warn!("Ignoring {}_OWNER_IDS: {}", ENV_PREFIX, e),
        }
    }

    if let Some(path) = lookup(&format!("{}_DATABASE_PATH", ENV_PREFIX)) {
        config.database.path = path;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `BRIDGEKEEPER_CONFIG` environment variable, otherwise returns "bridgekeeper.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "bridgekeeper.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;
    use std::collections::HashMap;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "original_token".to_string(),
                owner_ids: vec![1],
                status: None,
                command_prefix: "!".to_string(),
            },
            database: DatabaseConfig::default(),
        }
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "BRIDGEKEEPER");
    }

    #[test]
    fn test_no_vars_leaves_config_unchanged() {
        let result = apply_overrides_from(make_test_config(), lookup(&[]));

        assert_eq!(result.discord.token, "original_token");
        assert_eq!(result.discord.owner_ids, vec![1]);
        assert_eq!(result.database.path, "bridgekeeper.db");
    }

    #[test]
    fn test_overrides_applied() {
        let result = apply_overrides_from(
            make_test_config(),
            lookup(&[
                ("BRIDGEKEEPER_DISCORD_TOKEN", "env_token"),
                ("BRIDGEKEEPER_OWNER_IDS", "5, 6,7"),
                ("BRIDGEKEEPER_DATABASE_PATH", "/tmp/bridges.db"),
            ]),
        );

        assert_eq!(result.discord.token, "env_token");
        assert_eq!(result.discord.owner_ids, vec![5, 6, 7]);
        assert_eq!(result.database.path, "/tmp/bridges.db");
    }

    #[test]
    fn test_malformed_owner_ids_are_ignored() {
        let result = apply_overrides_from(
            make_test_config(),
            lookup(&[("BRIDGEKEEPER_OWNER_IDS", "5,abc")]),
        );
        assert_eq!(result.discord.owner_ids, vec![1]);
    }
}

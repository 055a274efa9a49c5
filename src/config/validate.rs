//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if config.discord.command_prefix.trim().is_empty() {
        errors.push("discord.command_prefix must not be empty".to_string());
    }
    for (i, id) in config.discord.owner_ids.iter().enumerate() {
        if *id == 0 {
            errors.push(format!("discord.owner_ids[{}] must be non-zero", i));
        }
    }

    if config.database.path.trim().is_empty() {
        errors.push("database.path is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

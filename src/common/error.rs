//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Rule store errors (persistence).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("A bridge needs at least one condition")]
    NoConditions,

    #[error("Invalid snowflake '{value}' in column {column}")]
    InvalidSnowflake { column: &'static str, value: String },
}

/// Errors raised while evaluating a single bridge condition.
///
/// These never escape the router: the offending condition is logged and
/// treated as not holding.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Pattern '{pattern}' failed to match: {message}")]
    MatchFailed { pattern: String, message: String },
}

/// Errors raised while delivering to one destination.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Discord session is not ready yet")]
    NotConnected,

    #[error("Not a member of guild {guild_id} (anymore)")]
    GuildNotFound { guild_id: u64 },

    #[error("No text channel {channel_id} in guild '{guild_name}' (anymore)")]
    ChannelNotFound { guild_name: String, channel_id: u64 },

    #[error("Failed to send to channel {channel_id}: {message}")]
    SendFailed { channel_id: u64, message: String },
}

impl DispatchError {
    /// Whether the destination could not be resolved at all (as opposed to a failed send).
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::GuildNotFound { .. } | Self::ChannelNotFound { .. }
        )
    }
}

/// Result type alias for rule store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for delivery operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

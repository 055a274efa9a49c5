//! Discord bot integration.
//!
//! This module connects the relay core to Discord: gateway events in,
//! relayed messages and command replies out.

pub mod client;
pub mod commands;
pub mod handler;
pub mod transport;

// Re-export main types for external use
pub use client::DiscordBotBuilder;
pub use commands::CommandHandler;
pub use handler::BridgeHandler;
pub use transport::DiscordTransport;

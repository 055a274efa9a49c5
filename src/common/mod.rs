//! Common utilities and types shared across the application.

pub mod error;
pub mod types;

pub use error::{ConditionError, ConfigError, DispatchError, StoreError};
pub use types::{Endpoint, InboundMessage, ResolvedEndpoint, Snowflake};

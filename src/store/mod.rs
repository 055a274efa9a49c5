//! Durable storage for bridges.
//!
//! The router only talks to the [`RuleStore`] trait; [`SqliteRuleStore`] is
//! the production implementation.

pub mod migrations;
pub mod sqlite;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::bridge::condition::Condition;
use crate::bridge::mentions::MentionPolicy;
use crate::common::error::StoreResult;
use crate::common::{ConditionError, Endpoint, Snowflake};

pub use sqlite::SqliteRuleStore;

/// One (bridge, condition) pairing as returned by the store.
///
/// A bridge with N conditions shows up as N rules sharing the same
/// `bridge_id`, endpoints and mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRule {
    pub bridge_id: i64,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub condition_id: i64,
    /// Attribute code as persisted; decoded lazily so corrupt rows only disable themselves.
    pub attribute: String,
    pub regex: String,
    pub mentions: MentionPolicy,
}

impl BridgeRule {
    pub fn condition(&self) -> Result<Condition, ConditionError> {
        Ok(Condition::new(self.attribute.parse()?, self.regex.clone()))
    }
}

/// A bridge about to be persisted.
#[derive(Debug, Clone)]
pub struct NewBridge {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub conditions: Vec<Condition>,
    pub mentions: MentionPolicy,
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules whose bridge starts at `channel_id`.
    async fn bridges_for_source(&self, channel_id: Snowflake) -> StoreResult<Vec<BridgeRule>>;

    /// Every rule of every bridge.
    async fn all_bridges(&self) -> StoreResult<Vec<BridgeRule>>;

    /// Distinct source channels of all bridges (for rebuilding the cache).
    async fn source_channels(&self) -> StoreResult<Vec<Snowflake>>;

    /// Persist a bridge with all its conditions and mentions, or nothing at all.
    async fn create_bridge(&self, bridge: NewBridge) -> StoreResult<i64>;

    /// Delete a bridge together with its conditions and mentions.
    ///
    /// Returns `false` if no such bridge existed.
    async fn remove_bridge(&self, bridge_id: i64) -> StoreResult<bool>;
}

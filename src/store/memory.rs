//! In-memory rule store double that counts queries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::common::error::{StoreError, StoreResult};
use crate::common::Snowflake;
use crate::store::{BridgeRule, NewBridge, RuleStore};

#[derive(Default)]
pub struct MemoryRuleStore {
    rules: Mutex<Vec<BridgeRule>>,
    next_id: AtomicUsize,
    queries: AtomicUsize,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule row verbatim, bypassing validation (e.g. to plant corrupt attributes).
    pub fn insert_rule(&self, rule: BridgeRule) {
        self.rules.lock().unwrap().push(rule);
    }

    /// Number of `bridges_for_source` calls so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn bridges_for_source(&self, channel_id: Snowflake) -> StoreResult<Vec<BridgeRule>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn all_bridges(&self) -> StoreResult<Vec<BridgeRule>> {
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn source_channels(&self) -> StoreResult<Vec<Snowflake>> {
        let mut channels: Vec<Snowflake> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.source.channel_id)
            .collect();
        channels.sort_unstable();
        channels.dedup();
        Ok(channels)
    }

    async fn create_bridge(&self, bridge: NewBridge) -> StoreResult<i64> {
        if bridge.conditions.is_empty() {
            return Err(StoreError::NoConditions);
        }
        let bridge_id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        let mut rules = self.rules.lock().unwrap();
        for (i, condition) in bridge.conditions.iter().enumerate() {
            rules.push(BridgeRule {
                bridge_id,
                source: bridge.source,
                destination: bridge.destination,
                condition_id: bridge_id * 100 + i as i64,
                attribute: condition.attribute.code().to_string(),
                regex: condition.regex.clone(),
                mentions: bridge.mentions.clone(),
            });
        }
        Ok(bridge_id)
    }

    async fn remove_bridge(&self, bridge_id: i64) -> StoreResult<bool> {
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| r.bridge_id != bridge_id);
        Ok(rules.len() != before)
    }
}

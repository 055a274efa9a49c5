//! Source channel cache.
//!
//! Keeps the set of channel ids that are the source of at least one bridge,
//! so that the vast majority of messages (unmonitored channels) can be
//! dropped without touching the rule store.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::common::Snowflake;

/// In-memory admission filter for inbound messages.
///
/// False positives are harmless (the store simply returns no bridges);
/// false negatives are not, so the cache must be rebuilt from the store at
/// startup and extended on every bridge creation. There is no `remove`:
/// a deleted bridge leaves its source behind until the next rebuild.
#[derive(Debug, Default)]
pub struct EndpointCache {
    channels: RwLock<HashSet<Snowflake>>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set in one step.
    pub fn rebuild(&self, channels: impl IntoIterator<Item = Snowflake>) {
        let fresh: HashSet<Snowflake> = channels.into_iter().collect();
        let mut guard = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        *guard = fresh;
    }

    pub fn contains(&self, channel_id: Snowflake) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&channel_id)
    }

    /// Insert a single source right after its bridge was persisted.
    pub fn add(&self, channel_id: Snowflake) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel_id);
    }

    pub fn len(&self) -> usize {
        self.channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

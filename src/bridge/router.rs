//! Message router: decides which destinations an inbound message goes to
//! and delivers it there.
//!
//! The dispatch pass for one message:
//! 1. drop our own messages and messages from unmonitored channels (cache miss, no store query),
//! 2. load every (bridge, condition) rule for the source channel,
//! 3. for each rule whose destination has not been served yet and whose
//!    condition holds, resolve the destination and queue a delivery,
//! 4. run the deliveries concurrently, chunks of one delivery strictly in order.
//!
//! Any single matching condition triggers its bridge, and every destination
//! receives a given message at most once.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::bridge::cache::EndpointCache;
use crate::bridge::chunk::{chunk, MAX_MESSAGE_LENGTH};
use crate::bridge::format::format_relay;
use crate::bridge::transport::Transport;
use crate::common::error::{DispatchResult, StoreResult};
use crate::common::{Endpoint, InboundMessage, ResolvedEndpoint};
use crate::store::{BridgeRule, NewBridge, RuleStore};

/// Outcome of delivering one message to one destination.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub bridge_id: i64,
    pub condition_id: i64,
    pub destination: Endpoint,
    /// Number of chunks sent, or why the destination was not served.
    pub result: DispatchResult<usize>,
}

/// Everything that happened while dispatching one message.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Rules loaded from the store (0 when the message was dropped early).
    pub rules_checked: usize,
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }
}

/// Routes inbound messages along persisted bridges.
pub struct Router {
    cache: EndpointCache,
    store: Arc<dyn RuleStore>,
    transport: Arc<dyn Transport>,
    max_message_length: usize,
}

impl Router {
    pub fn new(store: Arc<dyn RuleStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            cache: EndpointCache::new(),
            store,
            transport,
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }

    /// Override the chunk size used for outgoing messages.
    pub fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.cache
    }

    /// Reload the source channel cache from the store.
    ///
    /// Returns the number of monitored channels.
    pub async fn rebuild_cache(&self) -> StoreResult<usize> {
        let channels = self.store.source_channels().await?;
        self.cache.rebuild(channels);
        Ok(self.cache.len())
    }

    /// Persist a bridge and make it live immediately.
    pub async fn create_bridge(&self, bridge: NewBridge) -> StoreResult<i64> {
        let source = bridge.source;
        let bridge_id = self.store.create_bridge(bridge).await?;
        self.cache.add(source.channel_id);
        info!(bridge_id, source = %source, "Created bridge");
        Ok(bridge_id)
    }

    /// Delete a bridge.
    ///
    /// The source stays in the cache until the next rebuild; messages from it
    /// then cost one empty store query.
    pub async fn remove_bridge(&self, bridge_id: i64) -> StoreResult<bool> {
        let removed = self.store.remove_bridge(bridge_id).await?;
        if removed {
            info!(bridge_id, "Removed bridge");
        }
        Ok(removed)
    }

    /// All rules of all bridges, ordered by bridge.
    pub async fn bridges(&self) -> StoreResult<Vec<BridgeRule>> {
        self.store.all_bridges().await
    }

    /// Resolve an endpoint for display purposes.
    pub async fn describe(&self, endpoint: Endpoint) -> DispatchResult<ResolvedEndpoint> {
        self.transport.resolve(endpoint).await
    }

    /// Run one dispatch pass for `message`.
    pub async fn dispatch(&self, message: &InboundMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        if message.is_self {
            return report;
        }
        if !self.cache.contains(message.source.channel_id) {
            return report;
        }

        let rules = match self.store.bridges_for_source(message.source.channel_id).await {
            Ok(rules) => rules,
            Err(e) => {
                error!(source = %message.source, "Failed to load bridges: {}", e);
                return report;
            }
        };
        report.rules_checked = rules.len();

        let mut served: HashSet<Endpoint> = HashSet::new();
        let mut unreachable: HashSet<Endpoint> = HashSet::new();
        let mut pending = Vec::new();
        let mut pieces: Option<Vec<String>> = None;

        for rule in &rules {
            if served.contains(&rule.destination) || unreachable.contains(&rule.destination) {
                continue;
            }
            if !Self::holds(rule, message) {
                continue;
            }

            let destination = match self.transport.resolve(rule.destination).await {
                Ok(destination) => destination,
                Err(e) => {
                    error!(
                        bridge_id = rule.bridge_id,
                        condition_id = rule.condition_id,
                        destination = %rule.destination,
                        "Cannot forward message: {}",
                        e
                    );
                    unreachable.insert(rule.destination);
                    report.deliveries.push(Delivery {
                        bridge_id: rule.bridge_id,
                        condition_id: rule.condition_id,
                        destination: rule.destination,
                        result: Err(e),
                    });
                    continue;
                }
            };

            served.insert(rule.destination);
            let parts = pieces
                .get_or_insert_with(|| chunk(&format_relay(message), self.max_message_length))
                .clone();
            pending.push(self.deliver(rule, destination, parts));
        }

        report.deliveries.extend(join_all(pending).await);

        debug!(
            source = %message.source,
            rules = report.rules_checked,
            delivered = report.delivered(),
            failed = report.failed(),
            "Dispatch pass complete"
        );
        report
    }

    /// Evaluate a rule's condition, treating corrupt attributes as not holding.
    fn holds(rule: &BridgeRule, message: &InboundMessage) -> bool {
        match rule.condition() {
            Ok(condition) => condition.evaluate(message),
            Err(e) => {
                error!(
                    bridge_id = rule.bridge_id,
                    condition_id = rule.condition_id,
                    "Bad condition in store: {}",
                    e
                );
                false
            }
        }
    }

    /// Send all pieces to one destination, one after the other.
    async fn deliver(
        &self,
        rule: &BridgeRule,
        destination: ResolvedEndpoint,
        pieces: Vec<String>,
    ) -> Delivery {
        let mut sent = 0;
        for piece in &pieces {
            if let Err(e) = self.transport.send(&destination, piece, &rule.mentions).await {
                warn!(
                    bridge_id = rule.bridge_id,
                    destination = %destination.endpoint,
                    sent,
                    "Delivery failed: {}",
                    e
                );
                return Delivery {
                    bridge_id: rule.bridge_id,
                    condition_id: rule.condition_id,
                    destination: destination.endpoint,
                    result: Err(e),
                };
            }
            sent += 1;
        }

        info!(
            bridge_id = rule.bridge_id,
            "Relayed message to {}#{} in {} part(s)",
            destination.guild_name,
            destination.channel_name,
            sent
        );
        Delivery {
            bridge_id: rule.bridge_id,
            condition_id: rule.condition_id,
            destination: destination.endpoint,
            result: Ok(sent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::condition::{Attribute, Condition};
    use crate::bridge::mentions::MentionPolicy;
    use crate::bridge::transport::testing::RecordingTransport;
    use crate::common::DispatchError;
    use crate::store::memory::MemoryRuleStore;
    use crate::store::SqliteRuleStore;

    const SOURCE: Endpoint = Endpoint {
        guild_id: 1,
        channel_id: 10,
    };
    const DEST_A: Endpoint = Endpoint {
        guild_id: 2,
        channel_id: 20,
    };
    const DEST_B: Endpoint = Endpoint {
        guild_id: 3,
        channel_id: 30,
    };

    struct Fixture {
        store: Arc<MemoryRuleStore>,
        transport: Arc<RecordingTransport>,
        router: Router,
    }

    fn fixture(transport: RecordingTransport) -> Fixture {
        let store = Arc::new(MemoryRuleStore::new());
        let transport = Arc::new(transport);
        let router = Router::new(store.clone(), transport.clone());
        Fixture {
            store,
            transport,
            router,
        }
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            author_id: 42,
            author_name: Some("Barkeep".to_string()),
            is_self: false,
            source: SOURCE,
            guild_name: "Tavern".to_string(),
            channel_name: "general".to_string(),
            text: text.to_string(),
        }
    }

    fn bridge(destination: Endpoint, conditions: &[(Attribute, &str)]) -> NewBridge {
        NewBridge {
            source: SOURCE,
            destination,
            conditions: conditions
                .iter()
                .map(|(a, r)| Condition::new(*a, *r))
                .collect(),
            mentions: MentionPolicy::none(),
        }
    }

    #[tokio::test]
    async fn test_unmonitored_source_skips_store() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.store
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();
        // Persisted behind the router's back: cache was never told.

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(f.store.queries(), 0);
        assert!(report.deliveries.is_empty());
        assert!(f.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_own_messages_are_dropped() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let mut msg = message("hello");
        msg.is_self = true;
        f.router.dispatch(&msg).await;

        assert_eq!(f.store.queries(), 0);
        assert!(f.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_monitored_source_without_match() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, "^raid")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(f.store.queries(), 1);
        assert_eq!(report.rules_checked, 1);
        assert!(report.deliveries.is_empty());
        assert!(f.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_second_condition_alone_triggers_bridge() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.router
            .create_bridge(bridge(
                DEST_A,
                &[(Attribute::Text, "^raid"), (Attribute::UserId, "^42$")],
            ))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.delivered(), 1);
        assert_eq!(
            f.transport.sent_to(DEST_A),
            vec!["**Barkeep** (`Tavern#general`):\nhello"]
        );
    }

    #[tokio::test]
    async fn test_all_conditions_matching_deliver_once() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.router
            .create_bridge(bridge(
                DEST_A,
                &[(Attribute::Text, "hello"), (Attribute::UserName, "Barkeep")],
            ))
            .await
            .unwrap();

        f.router.dispatch(&message("hello")).await;

        assert_eq!(f.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_bridges_sharing_destination_deliver_once() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        for pattern in ["hel", "llo"] {
            f.router
                .create_bridge(bridge(DEST_A, &[(Attribute::Text, pattern)]))
                .await
                .unwrap();
        }

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.rules_checked, 2);
        assert_eq!(report.delivered(), 1);
        assert_eq!(f.transport.sent_to(DEST_A).len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_destinations_each_get_one_copy() {
        let f = fixture(RecordingTransport::new([DEST_A, DEST_B]));
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, "hello")]))
            .await
            .unwrap();
        f.router
            .create_bridge(bridge(DEST_B, &[(Attribute::ChannelName, "^general$")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(f.transport.sent_to(DEST_A).len(), 1);
        assert_eq!(f.transport.sent_to(DEST_B).len(), 1);
        assert_eq!(f.transport.sent_to(DEST_A), f.transport.sent_to(DEST_B));
    }

    #[tokio::test]
    async fn test_invalid_regex_does_not_block_siblings() {
        let f = fixture(RecordingTransport::new([DEST_A, DEST_B]));
        f.router
            .create_bridge(bridge(
                DEST_A,
                &[(Attribute::Text, "[broken"), (Attribute::Text, "hello")],
            ))
            .await
            .unwrap();
        f.router
            .create_bridge(bridge(DEST_B, &[(Attribute::Text, "(unclosed")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.delivered(), 1);
        assert_eq!(f.transport.sent_to(DEST_A).len(), 1);
        assert!(f.transport.sent_to(DEST_B).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_attribute_does_not_block_siblings() {
        let f = fixture(RecordingTransport::new([DEST_A, DEST_B]));
        f.store.insert_rule(BridgeRule {
            bridge_id: 900,
            source: SOURCE,
            destination: DEST_B,
            condition_id: 9000,
            attribute: "mood".to_string(),
            regex: ".*".to_string(),
            mentions: MentionPolicy::none(),
        });
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.rules_checked, 2);
        assert_eq!(report.delivered(), 1);
        assert!(f.transport.sent_to(DEST_B).is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_destination_is_skipped() {
        // DEST_A is not reachable.
        let f = fixture(RecordingTransport::new([DEST_B]));
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();
        f.router
            .create_bridge(bridge(DEST_B, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        let failure = report
            .deliveries
            .iter()
            .find(|d| d.destination == DEST_A)
            .unwrap();
        assert!(matches!(
            failure.result,
            Err(DispatchError::GuildNotFound { guild_id: 2 })
        ));
        assert_eq!(f.transport.sent_to(DEST_B).len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_destination_is_reported_once() {
        let f = fixture(RecordingTransport::default());
        f.router
            .create_bridge(bridge(
                DEST_A,
                &[(Attribute::Text, "h"), (Attribute::Text, "e"), (Attribute::Text, "o")],
            ))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.rules_checked, 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.deliveries[0].destination, DEST_A);
    }

    #[tokio::test]
    async fn test_corrupt_stored_bridge_does_not_block_siblings() {
        let store = Arc::new(SqliteRuleStore::in_memory().await.unwrap());
        let transport = Arc::new(RecordingTransport::new([DEST_A]));
        let router = Router::new(store.clone(), transport.clone());

        router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let corrupt = sqlx::query(
            "INSERT INTO bridges (source_guild, source_channel, destination_guild, destination_channel)
             VALUES ('1', '10', 'garbage', '40')",
        )
        .execute(store.pool())
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO bridge_conditions (bridge_id, attribute, regex) VALUES (?, 'text', '.*')")
            .bind(corrupt)
            .execute(store.pool())
            .await
            .unwrap();

        let report = router.dispatch(&message("hi")).await;

        assert_eq!(report.rules_checked, 1);
        assert_eq!(report.delivered(), 1);
        assert_eq!(transport.sent_to(DEST_A).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_other_destinations() {
        let f = fixture(RecordingTransport::new([DEST_B]).failing_on(DEST_A));
        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();
        f.router
            .create_bridge(bridge(DEST_B, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let report = f.router.dispatch(&message("hello")).await;

        assert_eq!(report.delivered(), 1);
        let failure = report
            .deliveries
            .iter()
            .find(|d| d.destination == DEST_A)
            .unwrap();
        assert!(matches!(
            &failure.result,
            Err(e) if !e.is_resolution()
        ));
        assert_eq!(f.transport.sent_to(DEST_B).len(), 1);
    }

    #[tokio::test]
    async fn test_long_messages_are_sent_in_order() {
        let store = Arc::new(MemoryRuleStore::new());
        let transport = Arc::new(RecordingTransport::new([DEST_A]));
        let router = Router::new(store.clone(), transport.clone()).with_max_message_length(10);
        router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        let msg = message("0123456789abcdefghij");
        let report = router.dispatch(&msg).await;

        let sent = transport.sent_to(DEST_A);
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|piece| piece.chars().count() <= 10));
        assert_eq!(sent.concat(), format_relay(&msg));
        assert!(matches!(report.deliveries[0].result, Ok(n) if n == sent.len()));
    }

    #[tokio::test]
    async fn test_created_bridge_is_live_immediately() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        assert!(!f.router.cache().contains(SOURCE.channel_id));

        f.router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        assert!(f.router.cache().contains(SOURCE.channel_id));
        assert_eq!(f.router.dispatch(&message("hi")).await.delivered(), 1);
    }

    #[tokio::test]
    async fn test_removed_bridge_leaves_harmless_cache_entry() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        let id = f
            .router
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        assert!(f.router.remove_bridge(id).await.unwrap());
        let report = f.router.dispatch(&message("hi")).await;

        assert!(f.router.cache().contains(SOURCE.channel_id));
        assert_eq!(f.store.queries(), 1);
        assert!(report.deliveries.is_empty());

        f.router.rebuild_cache().await.unwrap();
        assert!(!f.router.cache().contains(SOURCE.channel_id));
    }

    #[tokio::test]
    async fn test_rebuild_cache_from_store() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        f.store
            .create_bridge(bridge(DEST_A, &[(Attribute::Text, ".*")]))
            .await
            .unwrap();

        assert_eq!(f.router.rebuild_cache().await.unwrap(), 1);
        assert_eq!(f.router.dispatch(&message("hi")).await.delivered(), 1);
    }

    #[tokio::test]
    async fn test_create_without_conditions_leaves_cache_untouched() {
        let f = fixture(RecordingTransport::new([DEST_A]));
        assert!(f.router.create_bridge(bridge(DEST_A, &[])).await.is_err());
        assert!(!f.router.cache().contains(SOURCE.channel_id));
    }
}

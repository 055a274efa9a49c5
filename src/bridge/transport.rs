//! Platform send primitive used by the router.

use async_trait::async_trait;

use crate::bridge::mentions::MentionPolicy;
use crate::common::error::DispatchResult;
use crate::common::{Endpoint, ResolvedEndpoint};

/// Resolves destination endpoints and delivers text to them.
///
/// Implementations are expected to apply their own timeouts; the router
/// never cancels a send.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Check that the guild and text channel behind `endpoint` are still reachable.
    async fn resolve(&self, endpoint: Endpoint) -> DispatchResult<ResolvedEndpoint>;

    /// Send one message (already sized for the platform) to a resolved endpoint.
    async fn send(
        &self,
        destination: &ResolvedEndpoint,
        content: &str,
        mentions: &MentionPolicy,
    ) -> DispatchResult<()>;
}

//! Facet source trait definition
//!
//! A facet source is the discovery collaborator: given an entity id it
//! opens a stream of facet payloads. With `follow_updates` the stream stays
//! open and pushes later changes; without it the stream ends after the first
//! payload.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::error::DiscoveryError;
use crate::data::types::{EntityId, FacetSnapshotWire};

/// Stream of raw facet payloads for one entity
pub type FacetStream =
    Pin<Box<dyn Stream<Item = Result<FacetSnapshotWire, DiscoveryError>> + Send>>;

/// Facet discovery collaborator
///
/// Implementations should stop producing items once `cancel` fires. The
/// session enforces the stop on its side regardless, so a source that keeps
/// buffering after cancellation is wasteful but not incorrect.
#[async_trait]
pub trait FacetSource: Send + Sync {
    /// Open a discovery stream for `entity_id`
    async fn open(
        &self,
        entity_id: &EntityId,
        follow_updates: bool,
        cancel: CancellationToken,
    ) -> Result<FacetStream, DiscoveryError>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}

//! In-memory facet source
//!
//! Each entity gets a tokio broadcast channel plus the most recently
//! published payload. A follow subscription receives the retained payload
//! first and then live publishes; a one-shot subscription yields exactly one
//! payload, waiting for the first publish if nothing is retained yet.
//!
//! Subscribing and reading the retained payload happen under the same lock
//! that `publish` takes, so a subscriber never misses or double-receives a
//! payload published while it was opening.

use std::collections::HashMap;

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::backend::{FacetSource, FacetStream};
use super::error::DiscoveryError;
use crate::data::types::{EntityId, FacetSnapshotWire};

/// Default broadcast channel capacity per entity
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
enum MemoryEvent {
    Snapshot(FacetSnapshotWire),
    Failed(String),
}

struct Channel {
    tx: broadcast::Sender<MemoryEvent>,
    latest: Option<FacetSnapshotWire>,
}

impl Channel {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, latest: None }
    }

    /// Nothing retained and nobody listening
    fn is_idle(&self) -> bool {
        self.latest.is_none() && self.tx.receiver_count() == 0
    }
}

/// Local facet source backed by broadcast channels
pub struct MemoryFacetSource {
    channels: RwLock<HashMap<EntityId, Channel>>,
    capacity: usize,
    offline: RwLock<Option<String>>,
}

impl Default for MemoryFacetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFacetSource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            offline: RwLock::new(None),
        }
    }

    /// Publish a payload for an entity and retain it for later subscribers.
    ///
    /// Returns the number of live subscribers that received it.
    pub fn publish(&self, entity_id: &EntityId, snapshot: FacetSnapshotWire) -> usize {
        let mut channels = self.channels.write();
        let channel = channels
            .entry(entity_id.clone())
            .or_insert_with(|| Channel::new(self.capacity));
        channel.latest = Some(snapshot.clone());
        let delivered = channel.tx.send(MemoryEvent::Snapshot(snapshot)).unwrap_or(0);
        tracing::trace!(entity_id = %entity_id, delivered, "Published facet payload");
        delivered
    }

    /// Push a server-side error to every live subscriber of an entity
    pub fn fail(&self, entity_id: &EntityId, message: impl Into<String>) -> usize {
        let channels = self.channels.read();
        channels
            .get(entity_id)
            .and_then(|channel| channel.tx.send(MemoryEvent::Failed(message.into())).ok())
            .unwrap_or(0)
    }

    /// End every stream for an entity and forget its retained payload
    pub fn close(&self, entity_id: &EntityId) {
        if self.channels.write().remove(entity_id).is_some() {
            tracing::debug!(entity_id = %entity_id, "Closed facet channel");
        }
    }

    /// Make `open` fail with a connection error until cleared with `None`
    pub fn set_offline(&self, reason: Option<String>) {
        *self.offline.write() = reason;
    }

    pub fn subscriber_count(&self, entity_id: &EntityId) -> usize {
        self.channels
            .read()
            .get(entity_id)
            .map(|channel| channel.tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn latest(&self, entity_id: &EntityId) -> Option<FacetSnapshotWire> {
        self.channels
            .read()
            .get(entity_id)
            .and_then(|channel| channel.latest.clone())
    }
}

/// Drop channels left behind by subscribers of never-published entities
fn prune_idle(channels: &mut HashMap<EntityId, Channel>) {
    let before = channels.len();
    channels.retain(|_, channel| !channel.is_idle());
    let pruned = before - channels.len();
    if pruned > 0 {
        tracing::trace!(pruned, "Pruned idle facet channels");
    }
}

#[async_trait]
impl FacetSource for MemoryFacetSource {
    async fn open(
        &self,
        entity_id: &EntityId,
        follow_updates: bool,
        cancel: CancellationToken,
    ) -> Result<FacetStream, DiscoveryError> {
        if let Some(reason) = self.offline.read().clone() {
            return Err(DiscoveryError::Connection(reason));
        }

        let (mut rx, latest) = {
            let mut channels = self.channels.write();
            prune_idle(&mut channels);
            let channel = channels
                .entry(entity_id.clone())
                .or_insert_with(|| Channel::new(self.capacity));
            (channel.tx.subscribe(), channel.latest.clone())
        };
        let entity = entity_id.clone();

        let stream = stream! {
            if let Some(snapshot) = latest {
                yield Ok(snapshot);
                if !follow_updates {
                    return;
                }
            }

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => {
                        match event {
                            Ok(MemoryEvent::Snapshot(snapshot)) => {
                                yield Ok(snapshot);
                                if !follow_updates {
                                    break;
                                }
                            }
                            Ok(MemoryEvent::Failed(message)) => {
                                yield Err(DiscoveryError::Server(message));
                                break;
                            }
                            Err(RecvError::Lagged(n)) => {
                                tracing::warn!(
                                    entity_id = %entity,
                                    lagged = n,
                                    "Facet subscriber lagged behind"
                                );
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;

    fn payload(agents: &[&str]) -> FacetSnapshotWire {
        FacetSnapshotWire {
            agent_ids: Some(agents.iter().map(|a| json!(a)).collect()),
            ..Default::default()
        }
    }

    async fn next(stream: &mut FacetStream) -> Option<Result<FacetSnapshotWire, DiscoveryError>> {
        tokio::time::timeout(Duration::from_millis(500), stream.next())
            .await
            .expect("timed out waiting for facet payload")
    }

    #[tokio::test]
    async fn test_follow_receives_retained_then_live() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(42);
        source.publish(&id, payload(&["a"]));

        let mut stream = source
            .open(&id, true, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(next(&mut stream).await.unwrap().unwrap(), payload(&["a"]));

        assert_eq!(source.publish(&id, payload(&["b"])), 1);
        assert_eq!(next(&mut stream).await.unwrap().unwrap(), payload(&["b"]));
    }

    #[tokio::test]
    async fn test_one_shot_waits_for_first_publish_then_ends() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(7);

        let mut stream = source
            .open(&id, false, CancellationToken::new())
            .await
            .unwrap();
        source.publish(&id, payload(&["a"]));
        source.publish(&id, payload(&["b"]));

        assert_eq!(next(&mut stream).await.unwrap().unwrap(), payload(&["a"]));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_one_shot_with_retained_ends_immediately() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(7);
        source.publish(&id, payload(&["a"]));

        let mut stream = source
            .open(&id, false, CancellationToken::new())
            .await
            .unwrap();
        assert!(next(&mut stream).await.unwrap().is_ok());
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(1);
        let cancel = CancellationToken::new();

        let mut stream = source.open(&id, true, cancel.clone()).await.unwrap();
        cancel.cancel();
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_fail_yields_server_error_and_ends() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(1);

        let mut stream = source
            .open(&id, true, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(source.fail(&id, "boom"), 1);
        assert!(matches!(
            next(&mut stream).await,
            Some(Err(DiscoveryError::Server(msg))) if msg == "boom"
        ));
        assert!(next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_close_completes_streams() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(1);

        let mut stream = source
            .open(&id, true, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(source.subscriber_count(&id), 1);
        source.close(&id);
        assert!(next(&mut stream).await.is_none());
        assert!(source.latest(&id).is_none());
    }

    #[tokio::test]
    async fn test_offline_open_fails() {
        let source = MemoryFacetSource::new();
        source.set_offline(Some("unreachable".to_string()));

        let result = source
            .open(&EntityId::from(1), true, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DiscoveryError::Connection(_))));

        source.set_offline(None);
        assert!(
            source
                .open(&EntityId::from(1), true, CancellationToken::new())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unpublished_lookups_do_not_accumulate() {
        let source = MemoryFacetSource::new();
        let kept = EntityId::from(1);
        source.publish(&kept, payload(&["a"]));

        for id in 100..150 {
            let stream = source
                .open(&EntityId::from(id), true, CancellationToken::new())
                .await
                .unwrap();
            drop(stream);
        }
        let live = source
            .open(&EntityId::from(200), true, CancellationToken::new())
            .await
            .unwrap();

        let channels = source.channels.read();
        assert_eq!(channels.len(), 2);
        assert!(channels.contains_key(&kept));
        assert!(channels.contains_key(&EntityId::from(200)));
        drop(channels);
        drop(live);
    }

    #[tokio::test]
    async fn test_subscriber_survives_pruning() {
        let source = MemoryFacetSource::new();
        let id = EntityId::from(1);

        let mut stream = source
            .open(&id, true, CancellationToken::new())
            .await
            .unwrap();
        let other = source
            .open(&EntityId::from(2), true, CancellationToken::new())
            .await
            .unwrap();
        drop(other);

        assert_eq!(source.publish(&id, payload(&["a"])), 1);
        assert_eq!(next(&mut stream).await.unwrap().unwrap(), payload(&["a"]));
    }

    #[tokio::test]
    async fn test_entities_are_isolated() {
        let source = MemoryFacetSource::new();
        let a = EntityId::from(1);
        let b = EntityId::from(2);

        let mut stream = source
            .open(&a, true, CancellationToken::new())
            .await
            .unwrap();
        source.publish(&b, payload(&["other"]));
        source.publish(&a, payload(&["mine"]));
        assert_eq!(next(&mut stream).await.unwrap().unwrap(), payload(&["mine"]));
    }
}

//! Facet discovery session
//!
//! One session is bound to one entity id and owns one cancellable discovery
//! stream. Payloads are normalized (sorted, de-duplicated) and handed to the
//! registered handler in the order the source produced them.
//!
//! ## Cancellation
//!
//! Delivery and cancellation serialize on a gate. The stream task checks the
//! token while holding the gate, right before calling the handler; `cancel`
//! takes the gate before firing the token. Once `cancel` returns, no handler
//! call is in flight and none can start, even if the source already
//! buffered more payloads.
//!
//! ## Failures
//!
//! Transport errors end the session in `Failed`. They are logged and never
//! reach the handler.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::data::facets::FacetSource;
use crate::data::types::{EntityId, FacetSnapshot};

/// Receives every snapshot a session delivers.
///
/// Called with the session's delivery gate held: the handler must not cancel
/// its own session.
pub type SnapshotHandler = Arc<dyn Fn(FacetSnapshot) + Send + Sync>;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between the handle and the stream task
struct Shared {
    entity_id: EntityId,
    state: watch::Sender<SessionState>,
    gate: Mutex<()>,
    delivered: AtomicU64,
}

impl Shared {
    /// Move to `next` unless already terminal. Returns whether it moved.
    fn transition(&self, next: SessionState) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if state.is_terminal() || *state == next {
                return false;
            }
            *state = next;
            true
        });
        if moved {
            tracing::debug!(entity_id = %self.entity_id, state = %next, "Facet session transition");
        }
        moved
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Hand a snapshot to the handler unless the session was cancelled
    fn deliver(
        &self,
        cancel: &CancellationToken,
        snapshot: FacetSnapshot,
        handler: &SnapshotHandler,
    ) -> bool {
        let _gate = self.gate.lock();
        if cancel.is_cancelled() {
            tracing::trace!(entity_id = %self.entity_id, "Dropping snapshot after cancellation");
            return false;
        }
        handler(snapshot);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Handle to one discovery stream for one entity.
///
/// Not restartable: a new session is required per attempt. Dropping the
/// handle cancels the session.
pub struct FacetDiscoverySession {
    source: Arc<dyn FacetSource>,
    follow_updates: bool,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl FacetDiscoverySession {
    /// Create an idle session. Nothing is opened until [`start`](Self::start).
    pub fn new(source: Arc<dyn FacetSource>, entity_id: EntityId, follow_updates: bool) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            source,
            follow_updates,
            cancel: CancellationToken::new(),
            shared: Arc::new(Shared {
                entity_id,
                state,
                gate: Mutex::new(()),
                delivered: AtomicU64::new(0),
            }),
            handle: None,
        }
    }

    /// Open the stream and start delivering snapshots to `handler`.
    ///
    /// Returns `false` if the session already left `Idle`.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, handler: SnapshotHandler) -> bool {
        if self.state() != SessionState::Idle || !self.shared.transition(SessionState::Opening) {
            tracing::debug!(
                entity_id = %self.shared.entity_id,
                state = %self.state(),
                "Facet session is not restartable"
            );
            return false;
        }

        let task = run_session(
            self.source.clone(),
            self.follow_updates,
            self.cancel.clone(),
            self.shared.clone(),
            handler,
        );
        self.handle = Some(tokio::spawn(task));
        true
    }

    /// Stop delivery. No handler call happens after this returns.
    pub fn cancel(&self) {
        let _gate = self.shared.gate.lock();
        self.cancel.cancel();
        self.shared.transition(SessionState::Cancelled);
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.shared.entity_id
    }

    pub fn follow_updates(&self) -> bool {
        self.follow_updates
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Watch lifecycle transitions
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Snapshots handed to the handler so far
    pub fn delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Wait for the stream task to exit and return the final state
    pub async fn finished(&mut self) -> SessionState {
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(
                entity_id = %self.shared.entity_id,
                error = %e,
                "Facet session task aborted"
            );
            self.shared.transition(SessionState::Failed);
        }
        self.state()
    }
}

impl Drop for FacetDiscoverySession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for FacetDiscoverySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetDiscoverySession")
            .field("entity_id", &self.shared.entity_id)
            .field("source", &self.source.source_name())
            .field("follow_updates", &self.follow_updates)
            .field("state", &self.state())
            .field("delivered", &self.delivered())
            .finish()
    }
}

async fn run_session(
    source: Arc<dyn FacetSource>,
    follow_updates: bool,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    handler: SnapshotHandler,
) {
    let entity_id = shared.entity_id.clone();

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.open(&entity_id, follow_updates, cancel.clone()) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(
                entity_id = %entity_id,
                source = source.source_name(),
                error = %e,
                "Failed to open facet stream"
            );
            shared.transition(SessionState::Failed);
            return;
        }
    };

    if !shared.transition(SessionState::Streaming) {
        return;
    }

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            item = stream.next() => item,
        };

        match item {
            Some(Ok(wire)) => {
                let snapshot = FacetSnapshot::from_wire(wire);
                if !shared.deliver(&cancel, snapshot, &handler) {
                    return;
                }
                if !follow_updates {
                    shared.transition(SessionState::Completed);
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(
                    entity_id = %entity_id,
                    source = source.source_name(),
                    error = %e,
                    "Facet stream failed"
                );
                shared.transition(SessionState::Failed);
                return;
            }
            None => {
                shared.transition(SessionState::Completed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::facets::MemoryFacetSource;
    use crate::data::types::FacetSnapshotWire;
    use serde_json::json;
    use std::time::Duration;

    fn payload(agents: &[&str], ranks: &[serde_json::Value]) -> FacetSnapshotWire {
        FacetSnapshotWire {
            agent_ids: Some(agents.iter().map(|a| json!(a)).collect()),
            container_ids: None,
            rank_ids: Some(ranks.to_vec()),
        }
    }

    fn recording_handler() -> (SnapshotHandler, Arc<Mutex<Vec<FacetSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: SnapshotHandler = Arc::new(move |snapshot: FacetSnapshot| sink.lock().push(snapshot));
        (handler, seen)
    }

    async fn wait_for_state(session: &FacetDiscoverySession, want: SessionState) {
        let mut rx = session.watch_state();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == want))
            .await
            .expect("timed out waiting for session state")
            .expect("state channel closed");
    }

    async fn wait_for_delivered(session: &FacetDiscoverySession, count: u64) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.delivered() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for delivery");
    }

    #[tokio::test]
    async fn test_idle_until_started() {
        let source = Arc::new(MemoryFacetSource::new());
        let session = FacetDiscoverySession::new(source, EntityId::from(1), true);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_terminal());
    }

    #[tokio::test]
    async fn test_delivers_sorted_snapshots_in_order() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(42);
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        assert!(session.start(handler));
        wait_for_state(&session, SessionState::Streaming).await;

        source.publish(
            &id,
            payload(
                &["agent-10", "agent-2", "agent-1"],
                &[json!(10), json!(2), json!(1)],
            ),
        );
        source.publish(&id, payload(&["agent-3"], &[]));
        wait_for_delivered(&session, 2).await;

        let seen = seen.lock();
        assert_eq!(seen[0].agent_ids(), ["agent-1", "agent-2", "agent-10"]);
        assert_eq!(seen[0].rank_ids(), [1, 2, 10]);
        assert_eq!(seen[1].agent_ids(), ["agent-3"]);
    }

    #[tokio::test]
    async fn test_one_shot_completes_after_first_snapshot() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        source.publish(&id, payload(&["a"], &[]));
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), false);
        session.start(handler);
        assert_eq!(session.finished().await, SessionState::Completed);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(session.delivered(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        session.start(handler);
        wait_for_state(&session, SessionState::Streaming).await;

        source.publish(&id, payload(&["before"], &[]));
        wait_for_delivered(&session, 1).await;

        session.cancel();
        assert_eq!(session.state(), SessionState::Cancelled);

        source.publish(&id, payload(&["after"], &[]));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].agent_ids(), ["before"]);
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_buffered_payloads_dropped_after_cancel() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        session.start(handler);
        wait_for_state(&session, SessionState::Streaming).await;

        // Publish and cancel without yielding: payloads sit in the channel
        for i in 0..10 {
            source.publish(&id, payload(&[format!("agent-{}", i).as_str()], &[]));
        }
        session.cancel();
        let delivered_at_cancel = seen.lock().len();

        assert_eq!(session.finished().await, SessionState::Cancelled);
        assert_eq!(seen.lock().len(), delivered_at_cancel);
    }

    #[tokio::test]
    async fn test_cancel_before_start_is_terminal() {
        let source = Arc::new(MemoryFacetSource::new());
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), EntityId::from(1), true);
        session.cancel();
        assert!(!session.start(handler));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_not_restartable() {
        let source = Arc::new(MemoryFacetSource::new());
        let (handler, _) = recording_handler();

        let mut session = FacetDiscoverySession::new(source, EntityId::from(1), true);
        assert!(session.start(handler.clone()));
        assert!(!session.start(handler));
    }

    #[tokio::test]
    async fn test_transport_error_ends_failed_silently() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        session.start(handler);
        wait_for_state(&session, SessionState::Streaming).await;

        source.publish(&id, payload(&["a"], &[]));
        wait_for_delivered(&session, 1).await;
        source.fail(&id, "server went away");

        assert_eq!(session.finished().await, SessionState::Failed);
        assert_eq!(seen.lock().len(), 1);

        // Terminal states are sticky
        session.cancel();
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_open_failure_ends_failed() {
        let source = Arc::new(MemoryFacetSource::new());
        source.set_offline(Some("no route".to_string()));
        let (handler, seen) = recording_handler();

        let mut session = FacetDiscoverySession::new(source, EntityId::from(1), true);
        session.start(handler);
        assert_eq!(session.finished().await, SessionState::Failed);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_completes() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        let (handler, _) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        session.start(handler);
        wait_for_state(&session, SessionState::Streaming).await;
        source.close(&id);

        assert_eq!(session.finished().await, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_drop_cancels_and_releases_subscription() {
        let source = Arc::new(MemoryFacetSource::new());
        let id = EntityId::from(1);
        let (handler, _) = recording_handler();

        let mut session = FacetDiscoverySession::new(source.clone(), id.clone(), true);
        session.start(handler);
        wait_for_state(&session, SessionState::Streaming).await;
        let mut states = session.watch_state();
        assert_eq!(source.subscriber_count(&id), 1);

        drop(session);
        assert_eq!(*states.borrow_and_update(), SessionState::Cancelled);

        tokio::time::timeout(Duration::from_secs(1), async {
            while source.subscriber_count(&id) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was not released");
    }
}

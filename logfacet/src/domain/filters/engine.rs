//! Filter engine
//!
//! Composition root for one filter surface. It owns the discovery session
//! for the mounted entity and the facet aggregator fed by it. Filter criteria
//! are not stored here: every edit takes the host's current criteria and
//! returns (and broadcasts) the proposed next one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::aggregator::{FacetAggregator, FilterSurface};
use super::reducer;
use super::session::{FacetDiscoverySession, SessionState, SnapshotHandler};
use crate::data::facets::FacetSource;
use crate::data::types::{
    EntityId, FacetSnapshot, FilterChange, FilterCriteria, LevelOption, LogLevel,
};
use crate::utils::time::normalize_boundary;

/// Host callback receiving every proposed criteria
pub type ChangeCallback = Box<dyn Fn(&FilterCriteria) + Send + Sync>;

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Keep discovery streams open for later facet changes
    pub follow_updates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            follow_updates: true,
        }
    }
}

pub struct FilterEngine {
    source: Arc<dyn FacetSource>,
    config: EngineConfig,
    facets: Arc<Mutex<FacetAggregator>>,
    updated: Arc<Notify>,
    session: Option<FacetDiscoverySession>,
    on_change: Option<ChangeCallback>,
}

impl FilterEngine {
    pub fn new(source: Arc<dyn FacetSource>, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            facets: Arc::new(Mutex::new(FacetAggregator::new())),
            updated: Arc::new(Notify::new()),
            session: None,
            on_change: None,
        }
    }

    pub fn with_on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FilterCriteria) + Send + Sync + 'static,
    {
        self.set_on_change(callback);
        self
    }

    pub fn set_on_change<F>(&mut self, callback: F)
    where
        F: Fn(&FilterCriteria) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(callback));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Bind the engine to an entity.
    ///
    /// Mounting the already-mounted id is a no-op while its session is still
    /// live. Otherwise the previous session is cancelled before the facets
    /// are reset and the new session opens. Returns whether a new session was
    /// started.
    pub fn mount(&mut self, entity_id: impl Into<EntityId>) -> bool {
        let entity_id = entity_id.into();
        if self.entity_id() == Some(&entity_id) && !self.session_state().is_terminal() {
            return false;
        }
        self.start_session(entity_id);
        true
    }

    /// Reopen discovery for the mounted entity
    pub fn refresh(&mut self) -> bool {
        match self.entity_id().cloned() {
            Some(entity_id) => {
                self.start_session(entity_id);
                true
            }
            None => false,
        }
    }

    /// Cancel discovery and forget the mounted entity
    pub fn unmount(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(entity_id = %session.entity_id(), "Unmounting filter engine");
            session.cancel();
        }
        self.facets.lock().reset();
    }

    fn start_session(&mut self, entity_id: EntityId) {
        if let Some(previous) = self.session.take() {
            previous.cancel();
        }
        self.facets.lock().reset();

        tracing::debug!(
            entity_id = %entity_id,
            source = self.source.source_name(),
            follow_updates = self.config.follow_updates,
            "Starting facet discovery"
        );

        let facets = self.facets.clone();
        let updated = self.updated.clone();
        let handler: SnapshotHandler = Arc::new(move |snapshot: FacetSnapshot| {
            facets.lock().apply(snapshot);
            updated.notify_waiters();
        });

        let mut session =
            FacetDiscoverySession::new(self.source.clone(), entity_id, self.config.follow_updates);
        session.start(handler);
        self.session = Some(session);
    }

    pub fn entity_id(&self) -> Option<&EntityId> {
        self.session.as_ref().map(FacetDiscoverySession::entity_id)
    }

    /// `Idle` when nothing is mounted
    pub fn session_state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, FacetDiscoverySession::state)
    }

    /// Wait until a snapshot is available, the session ends, or `timeout`.
    ///
    /// Returns whether a snapshot is available.
    pub async fn wait_for_snapshot(&self, timeout: Duration) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let mut states = session.watch_state();

        let wait = async {
            loop {
                let notified = self.updated.notified();
                if self.facets.lock().snapshot().is_some() {
                    return true;
                }
                if states.borrow_and_update().is_terminal() {
                    return self.facets.lock().snapshot().is_some();
                }
                tokio::select! {
                    _ = notified => {}
                    changed = states.changed() => {
                        if changed.is_err() {
                            return self.facets.lock().snapshot().is_some();
                        }
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    // ========================================================================
    // Facets
    // ========================================================================

    pub fn has_usable_facets(&self) -> bool {
        self.facets.lock().has_usable_facets()
    }

    pub fn surface(&self) -> FilterSurface {
        self.facets.lock().surface()
    }

    /// Latest snapshot for the mounted entity, if one arrived
    pub fn facets(&self) -> Option<FacetSnapshot> {
        self.facets.lock().snapshot().cloned()
    }

    pub fn selectable_levels(&self) -> Vec<LevelOption> {
        LogLevel::selectable()
    }

    // ========================================================================
    // Criteria transitions
    // ========================================================================

    /// Run the reducer and broadcast the result
    pub fn apply_change(&self, current: &FilterCriteria, change: FilterChange) -> FilterCriteria {
        let fields = change.touched_fields();
        let next = reducer::reduce(current, change);
        tracing::debug!(fields = ?fields, "Filter criteria changed");
        self.broadcast(&next);
        next
    }

    pub fn clear(&self) -> FilterCriteria {
        let next = reducer::clear();
        tracing::debug!("Filter criteria cleared");
        self.broadcast(&next);
        next
    }

    pub fn set_agents<I, S>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_change(current, FilterChange::agents(values))
    }

    pub fn set_containers<I, S>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_change(current, FilterChange::containers(values))
    }

    pub fn set_ranks<I>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = i64>,
    {
        self.apply_change(current, FilterChange::ranks(values))
    }

    pub fn set_levels<I>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = LogLevel>,
    {
        self.apply_change(current, FilterChange::levels(values))
    }

    pub fn set_sources<I, S>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_change(current, FilterChange::sources(values))
    }

    pub fn set_stdtypes<I, S>(&self, current: &FilterCriteria, values: I) -> FilterCriteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_change(current, FilterChange::stdtypes(values))
    }

    /// Set the lower time bound from a local wall-clock pick (`None` clears it)
    pub fn set_timestamp_after<Tz: TimeZone>(
        &self,
        current: &FilterCriteria,
        local: Option<DateTime<Tz>>,
    ) -> FilterCriteria {
        self.apply_change(
            current,
            FilterChange::timestamp_after(normalize_boundary(local)),
        )
    }

    /// Set the upper time bound from a local wall-clock pick (`None` clears it)
    pub fn set_timestamp_before<Tz: TimeZone>(
        &self,
        current: &FilterCriteria,
        local: Option<DateTime<Tz>>,
    ) -> FilterCriteria {
        self.apply_change(
            current,
            FilterChange::timestamp_before(normalize_boundary(local)),
        )
    }

    fn broadcast(&self, criteria: &FilterCriteria) {
        if let Some(callback) = &self.on_change {
            callback(criteria);
        }
    }
}

impl fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEngine")
            .field("source", &self.source.source_name())
            .field("config", &self.config)
            .field("session", &self.session)
            .field("surface", &self.surface())
            .field("has_on_change", &self.on_change.is_some())
            .finish()
    }
}

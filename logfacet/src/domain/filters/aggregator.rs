//! Facet aggregation and surface visibility

use serde::Serialize;

use crate::data::types::FacetSnapshot;

/// What the host should do with the filter surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSurface {
    /// No snapshot yet: render with empty lists
    Loading,
    /// At least one facet list has values
    Ready,
    /// A snapshot arrived with nothing to filter by: do not render
    Suppressed,
}

impl FilterSurface {
    pub fn should_render(&self) -> bool {
        !matches!(self, Self::Suppressed)
    }
}

/// Holds the latest facet snapshot for one entity.
///
/// Snapshots replace each other wholesale; nothing from an earlier snapshot
/// survives `apply`.
#[derive(Debug, Clone, Default)]
pub struct FacetAggregator {
    snapshot: Option<FacetSnapshot>,
    applied: u64,
}

impl FacetAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: FacetSnapshot) {
        self.applied += 1;
        tracing::trace!(
            agents = snapshot.agent_ids().len(),
            containers = snapshot.container_ids().len(),
            ranks = snapshot.rank_ids().len(),
            applied = self.applied,
            "Applied facet snapshot"
        );
        self.snapshot = Some(snapshot);
    }

    /// Back to the loading state
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.applied = 0;
    }

    pub fn snapshot(&self) -> Option<&FacetSnapshot> {
        self.snapshot.as_ref()
    }

    /// Number of snapshots applied since the last reset
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn agent_ids(&self) -> &[String] {
        self.snapshot.as_ref().map(|s| s.agent_ids()).unwrap_or_default()
    }

    pub fn container_ids(&self) -> &[String] {
        self.snapshot.as_ref().map(|s| s.container_ids()).unwrap_or_default()
    }

    pub fn rank_ids(&self) -> &[i64] {
        self.snapshot.as_ref().map(|s| s.rank_ids()).unwrap_or_default()
    }

    pub fn has_usable_facets(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(FacetSnapshot::has_usable_facets)
    }

    pub fn surface(&self) -> FilterSurface {
        match &self.snapshot {
            None => FilterSurface::Loading,
            Some(snapshot) if snapshot.has_usable_facets() => FilterSurface::Ready,
            Some(_) => FilterSurface::Suppressed,
        }
    }

    pub fn should_render(&self) -> bool {
        self.surface().should_render()
    }
}

//! Facet discovery and filter state engine for live task log streams.
//!
//! A [`FilterEngine`] binds to one entity, keeps the latest facet snapshot
//! the discovery source reports for it, and turns operator edits into the
//! next [`FilterCriteria`] for the host to adopt.

mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

pub use data::facets::{DiscoveryError, FacetSource, MemoryFacetSource, NdjsonFacetSource};
pub use data::types::{
    EntityId, FacetSnapshot, FacetSnapshotWire, FilterChange, FilterCriteria, LogLevel,
};
pub use domain::filters::{
    EngineConfig, FacetAggregator, FacetDiscoverySession, FilterEngine, FilterSurface,
    SessionState,
};

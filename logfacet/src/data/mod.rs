//! Data layer: facet discovery sources and the shared data types

pub mod facets;
pub mod types;

pub use facets::{DiscoveryError, FacetSource, FacetStream, MemoryFacetSource, NdjsonFacetSource};
pub use types::{
    EntityId, FacetSnapshot, FacetSnapshotWire, FilterChange, FilterCriteria, LevelOption,
    LogLevel,
};

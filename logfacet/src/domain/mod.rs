pub mod filters;

pub use filters::{
    EngineConfig, FacetAggregator, FacetDiscoverySession, FilterEngine, FilterSurface,
    SessionState,
};

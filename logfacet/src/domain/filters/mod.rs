//! Filter surface: discovery sessions, facet aggregation and criteria state

mod aggregator;
mod engine;
mod reducer;
mod session;

pub use aggregator::{FacetAggregator, FilterSurface};
pub use engine::{ChangeCallback, EngineConfig, FilterEngine};
pub use reducer::{clear, reduce};
pub use session::{FacetDiscoverySession, SessionState, SnapshotHandler};

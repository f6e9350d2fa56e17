//! Facet discovery sources
//!
//! The engine talks to the discovery service through [`FacetSource`]. Two
//! in-process implementations ship with the crate:
//! - In-memory (`MemoryFacetSource`) - per-entity broadcast channels with the
//!   latest payload retained, for embedding hosts and tests
//! - NDJSON replay (`NdjsonFacetSource`) - reads `<dir>/<entity>.ndjson`,
//!   one streaming envelope per line, used by the CLI

mod backend;
mod error;
mod memory;
mod ndjson;

pub use backend::{FacetSource, FacetStream};
pub use error::DiscoveryError;
pub use memory::MemoryFacetSource;
pub use ndjson::NdjsonFacetSource;

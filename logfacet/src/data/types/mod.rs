//! Data types shared by the discovery sources and the filter engine

mod criteria;
mod enums;
mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use criteria::{FilterChange, FilterCriteria};
pub use enums::{LevelOption, LogLevel};
pub use snapshot::{FacetSnapshot, FacetSnapshotWire, WireEnvelope};

/// Opaque identifier of the task whose logs are being filtered
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

//! Facet snapshots
//!
//! A snapshot is the complete set of currently known agent, container and
//! rank values for one entity. Wire payloads are coerced leniently: ids of
//! the wrong primitive type are converted where possible and dropped
//! otherwise, never rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::sort::sort_alphanumeric;

/// Facet payload as delivered by the discovery service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSnapshotWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ids: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_ids: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_ids: Option<Vec<Value>>,
}

/// Streaming envelope: `{"result": {...}}`, `{"error": {...}}` or a bare payload
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireEnvelope {
    Result { result: FacetSnapshotWire },
    Error { error: Value },
    Bare(FacetSnapshotWire),
}

/// Normalized facet snapshot: unique values, alphanumerically sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSnapshot {
    agent_ids: Vec<String>,
    container_ids: Vec<String>,
    rank_ids: Vec<i64>,
}

impl FacetSnapshot {
    /// Build a snapshot, sorting and de-duplicating every list
    pub fn new(
        mut agent_ids: Vec<String>,
        mut container_ids: Vec<String>,
        mut rank_ids: Vec<i64>,
    ) -> Self {
        sort_alphanumeric(&mut agent_ids);
        sort_alphanumeric(&mut container_ids);
        rank_ids.sort_unstable();
        rank_ids.dedup();
        Self {
            agent_ids,
            container_ids,
            rank_ids,
        }
    }

    pub fn from_wire(wire: FacetSnapshotWire) -> Self {
        let agent_ids = coerce_ids("agentIds", wire.agent_ids);
        let container_ids = coerce_ids("containerIds", wire.container_ids);
        let rank_ids = wire
            .rank_ids
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| {
                let rank = coerce_rank(&value);
                if rank.is_none() {
                    tracing::debug!(value = %value, "Dropping non-numeric rank id");
                }
                rank
            })
            .collect();
        Self::new(agent_ids, container_ids, rank_ids)
    }

    pub fn agent_ids(&self) -> &[String] {
        &self.agent_ids
    }

    pub fn container_ids(&self) -> &[String] {
        &self.container_ids
    }

    pub fn rank_ids(&self) -> &[i64] {
        &self.rank_ids
    }

    /// True when at least one facet list has a value to filter by
    pub fn has_usable_facets(&self) -> bool {
        !self.agent_ids.is_empty() || !self.container_ids.is_empty() || !self.rank_ids.is_empty()
    }
}

impl From<FacetSnapshotWire> for FacetSnapshot {
    fn from(wire: FacetSnapshotWire) -> Self {
        Self::from_wire(wire)
    }
}

fn coerce_ids(field: &'static str, values: Option<Vec<Value>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            other => {
                tracing::debug!(field, value = %other, "Dropping malformed facet id");
                None
            }
        })
        .collect()
}

fn coerce_rank(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

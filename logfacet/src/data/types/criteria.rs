//! Filter criteria and partial changes
//!
//! `FilterCriteria` is a controlled value: the host owns it, the engine only
//! proposes the next one. An absent field means "unconstrained"; an empty set
//! is a distinct, explicit selection and is never collapsed back to absent.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::LogLevel;

/// The filter the operator is constructing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_ids: Option<BTreeSet<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<BTreeSet<LogLevel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdtypes: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_before: Option<DateTime<Utc>>,
}

impl FilterCriteria {
    /// True when no dimension is constrained (`{}`)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A partial update to [`FilterCriteria`].
///
/// Per field: `None` leaves the field alone, `Some(None)` makes it absent,
/// `Some(Some(v))` sets it to `v`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChange {
    pub agent_ids: Option<Option<BTreeSet<String>>>,
    pub container_ids: Option<Option<BTreeSet<String>>>,
    pub rank_ids: Option<Option<BTreeSet<i64>>>,
    pub levels: Option<Option<BTreeSet<LogLevel>>>,
    pub sources: Option<Option<BTreeSet<String>>>,
    pub stdtypes: Option<Option<BTreeSet<String>>>,
    pub timestamp_after: Option<Option<DateTime<Utc>>>,
    pub timestamp_before: Option<Option<DateTime<Utc>>>,
}

fn strings<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl FilterChange {
    pub fn agents<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_agents(values)
    }

    pub fn containers<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_containers(values)
    }

    pub fn ranks<I: IntoIterator<Item = i64>>(values: I) -> Self {
        Self::default().with_ranks(values)
    }

    pub fn levels<I: IntoIterator<Item = LogLevel>>(values: I) -> Self {
        Self::default().with_levels(values)
    }

    pub fn sources<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_sources(values)
    }

    pub fn stdtypes<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_stdtypes(values)
    }

    pub fn timestamp_after(value: Option<DateTime<Utc>>) -> Self {
        Self::default().with_timestamp_after(value)
    }

    pub fn timestamp_before(value: Option<DateTime<Utc>>) -> Self {
        Self::default().with_timestamp_before(value)
    }

    pub fn with_agents<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_ids = Some(Some(strings(values)));
        self
    }

    pub fn with_containers<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container_ids = Some(Some(strings(values)));
        self
    }

    pub fn with_ranks<I: IntoIterator<Item = i64>>(mut self, values: I) -> Self {
        self.rank_ids = Some(Some(values.into_iter().collect()));
        self
    }

    pub fn with_levels<I: IntoIterator<Item = LogLevel>>(mut self, values: I) -> Self {
        self.levels = Some(Some(values.into_iter().collect()));
        self
    }

    pub fn with_sources<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(Some(strings(values)));
        self
    }

    pub fn with_stdtypes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stdtypes = Some(Some(strings(values)));
        self
    }

    pub fn with_timestamp_after(mut self, value: Option<DateTime<Utc>>) -> Self {
        self.timestamp_after = Some(value);
        self
    }

    pub fn with_timestamp_before(mut self, value: Option<DateTime<Utc>>) -> Self {
        self.timestamp_before = Some(value);
        self
    }

    /// Names of the fields this change overwrites (wire spelling)
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.agent_ids.is_some() {
            fields.push("agentIds");
        }
        if self.container_ids.is_some() {
            fields.push("containerIds");
        }
        if self.rank_ids.is_some() {
            fields.push("rankIds");
        }
        if self.levels.is_some() {
            fields.push("levels");
        }
        if self.sources.is_some() {
            fields.push("sources");
        }
        if self.stdtypes.is_some() {
            fields.push("stdtypes");
        }
        if self.timestamp_after.is_some() {
            fields.push("timestampAfter");
        }
        if self.timestamp_before.is_some() {
            fields.push("timestampBefore");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

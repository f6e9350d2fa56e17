//! Filter state transitions
//!
//! Pure functions: the current criteria is never mutated, the next one is
//! returned for the host to adopt.

use crate::data::types::{FilterChange, FilterCriteria};

/// Apply a partial change. Fields the change does not touch pass through.
pub fn reduce(current: &FilterCriteria, change: FilterChange) -> FilterCriteria {
    let mut next = current.clone();

    if let Some(value) = change.agent_ids {
        next.agent_ids = value;
    }
    if let Some(value) = change.container_ids {
        next.container_ids = value;
    }
    if let Some(value) = change.rank_ids {
        next.rank_ids = value;
    }
    if let Some(value) = change.levels {
        next.levels = value;
    }
    if let Some(value) = change.sources {
        next.sources = value;
    }
    if let Some(value) = change.stdtypes {
        next.stdtypes = value;
    }
    if let Some(value) = change.timestamp_after {
        next.timestamp_after = value;
    }
    if let Some(value) = change.timestamp_before {
        next.timestamp_before = value;
    }

    next
}

/// The empty criteria, regardless of what was set before
pub fn clear() -> FilterCriteria {
    FilterCriteria::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::LogLevel;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn populated() -> FilterCriteria {
        FilterCriteria {
            agent_ids: Some(["agent-1".to_string()].into_iter().collect()),
            container_ids: Some(["c-1".to_string()].into_iter().collect()),
            rank_ids: Some([0, 1].into_iter().collect()),
            levels: Some([LogLevel::Error].into_iter().collect()),
            sources: Some(["master".to_string()].into_iter().collect()),
            stdtypes: Some(["stdout".to_string()].into_iter().collect()),
            timestamp_after: Some(Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap()),
            timestamp_before: Some(Utc.with_ymd_and_hms(2023, 6, 2, 10, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_single_field_change_leaves_others() {
        let current = populated();
        let next = reduce(&current, FilterChange::agents(["agent-2", "agent-3"]));

        let expected = FilterCriteria {
            agent_ids: Some(
                ["agent-2".to_string(), "agent-3".to_string()]
                    .into_iter()
                    .collect(),
            ),
            ..current.clone()
        };
        assert_eq!(next, expected);
    }

    #[test]
    fn test_every_field_is_independently_settable() {
        let current = populated();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cases: Vec<(FilterChange, FilterCriteria)> = vec![
            (
                FilterChange::containers(["c-9"]),
                FilterCriteria {
                    container_ids: Some(["c-9".to_string()].into_iter().collect()),
                    ..current.clone()
                },
            ),
            (
                FilterChange::ranks([4]),
                FilterCriteria {
                    rank_ids: Some([4].into_iter().collect()),
                    ..current.clone()
                },
            ),
            (
                FilterChange::levels([LogLevel::Debug]),
                FilterCriteria {
                    levels: Some([LogLevel::Debug].into_iter().collect()),
                    ..current.clone()
                },
            ),
            (
                FilterChange::sources(["agent"]),
                FilterCriteria {
                    sources: Some(["agent".to_string()].into_iter().collect()),
                    ..current.clone()
                },
            ),
            (
                FilterChange::stdtypes(["stderr"]),
                FilterCriteria {
                    stdtypes: Some(["stderr".to_string()].into_iter().collect()),
                    ..current.clone()
                },
            ),
            (
                FilterChange::timestamp_after(Some(after)),
                FilterCriteria {
                    timestamp_after: Some(after),
                    ..current.clone()
                },
            ),
            (
                FilterChange::timestamp_before(None),
                FilterCriteria {
                    timestamp_before: None,
                    ..current.clone()
                },
            ),
        ];

        for (change, expected) in cases {
            let fields = change.touched_fields();
            assert_eq!(reduce(&current, change), expected, "field {:?}", fields);
        }
    }

    #[test]
    fn test_empty_selection_is_not_absent() {
        let next = reduce(&FilterCriteria::default(), FilterChange::agents(Vec::<String>::new()));
        assert_eq!(next.agent_ids, Some(BTreeSet::new()));
        assert!(!next.is_empty());
    }

    #[test]
    fn test_empty_change_is_identity() {
        let current = populated();
        assert_eq!(reduce(&current, FilterChange::default()), current);
    }

    #[test]
    fn test_current_is_not_mutated() {
        let current = populated();
        let snapshot = current.clone();
        let _ = reduce(&current, FilterChange::ranks([]));
        assert_eq!(current, snapshot);
    }

    #[test]
    fn test_clear_discards_everything_including_time_bounds() {
        assert!(clear().is_empty());
        assert_eq!(clear(), FilterCriteria::default());
        assert_eq!(serde_json::to_string(&clear()).unwrap(), "{}");
    }
}

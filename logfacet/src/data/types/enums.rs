//! Log level enumeration
//!
//! Levels arrive on the wire as free-form `LOG_LEVEL_*` strings. They are
//! validated at the boundary: anything unrecognized becomes `Unspecified`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum LogLevel {
    #[default]
    #[serde(rename = "LOG_LEVEL_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "LOG_LEVEL_TRACE")]
    Trace,
    #[serde(rename = "LOG_LEVEL_DEBUG")]
    Debug,
    #[serde(rename = "LOG_LEVEL_INFO")]
    Info,
    #[serde(rename = "LOG_LEVEL_WARNING")]
    Warning,
    #[serde(rename = "LOG_LEVEL_ERROR")]
    Error,
    #[serde(rename = "LOG_LEVEL_CRITICAL")]
    Critical,
}

/// A level offered to the operator, with its display label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelOption {
    pub label: &'static str,
    pub value: LogLevel,
}

const SELECTABLE: [LogLevel; 6] = [
    LogLevel::Trace,
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warning,
    LogLevel::Error,
    LogLevel::Critical,
];

impl LogLevel {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Unspecified => "LOG_LEVEL_UNSPECIFIED",
            Self::Trace => "LOG_LEVEL_TRACE",
            Self::Debug => "LOG_LEVEL_DEBUG",
            Self::Info => "LOG_LEVEL_INFO",
            Self::Warning => "LOG_LEVEL_WARNING",
            Self::Error => "LOG_LEVEL_ERROR",
            Self::Critical => "LOG_LEVEL_CRITICAL",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
        }
    }

    /// Parse a wire name or a case-insensitive label. Never fails.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let short = value
            .strip_prefix("LOG_LEVEL_")
            .unwrap_or(value)
            .to_ascii_lowercase();
        match short.as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warning" | "warn" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            _ => Self::Unspecified,
        }
    }

    /// Levels the operator can pick from, in severity order
    pub fn selectable() -> Vec<LevelOption> {
        SELECTABLE
            .iter()
            .map(|&value| LevelOption {
                label: value.label(),
                value,
            })
            .collect()
    }

    pub fn is_selectable(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl From<&str> for LogLevel {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Lenient: any wire value decodes, non-strings become `Unspecified`
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(raw) => Ok(Self::parse(&raw)),
            other => {
                tracing::debug!(value = %other, "Non-string log level on the wire");
                Ok(Self::Unspecified)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(LogLevel::parse("LOG_LEVEL_TRACE"), LogLevel::Trace);
        assert_eq!(LogLevel::parse("LOG_LEVEL_WARNING"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("LOG_LEVEL_CRITICAL"), LogLevel::Critical);
        assert_eq!(
            LogLevel::parse("LOG_LEVEL_UNSPECIFIED"),
            LogLevel::Unspecified
        );
    }

    #[test]
    fn test_parse_labels_case_insensitive() {
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("Error"), LogLevel::Error);
        assert_eq!(LogLevel::parse(" DEBUG "), LogLevel::Debug);
        assert_eq!(LogLevel::parse("warn"), LogLevel::Warning);
    }

    #[test]
    fn test_parse_unknown_is_unspecified() {
        assert_eq!(LogLevel::parse("LOG_LEVEL_FATAL"), LogLevel::Unspecified);
        assert_eq!(LogLevel::parse(""), LogLevel::Unspecified);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Unspecified);
    }

    #[test]
    fn test_selectable_excludes_unspecified() {
        let options = LogLevel::selectable();
        assert_eq!(options.len(), 6);
        assert!(options.iter().all(|o| o.value.is_selectable()));
        assert_eq!(options[0].label, "Trace");
        assert_eq!(options[5].value, LogLevel::Critical);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, r#""LOG_LEVEL_WARNING""#);

        let level: LogLevel = serde_json::from_str(r#""LOG_LEVEL_INFO""#).unwrap();
        assert_eq!(level, LogLevel::Info);

        let level: LogLevel = serde_json::from_str(r#""SOMETHING_ELSE""#).unwrap();
        assert_eq!(level, LogLevel::Unspecified);
    }

    #[test]
    fn test_non_string_wire_level_is_unspecified() {
        let level: LogLevel = serde_json::from_str("3").unwrap();
        assert_eq!(level, LogLevel::Unspecified);

        let levels: Vec<LogLevel> =
            serde_json::from_str(r#"["LOG_LEVEL_ERROR", 3, null, {"x": 1}]"#).unwrap();
        assert_eq!(
            levels,
            [
                LogLevel::Error,
                LogLevel::Unspecified,
                LogLevel::Unspecified,
                LogLevel::Unspecified
            ]
        );
    }

    #[test]
    fn test_severity_order() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Error < LogLevel::Critical);
    }
}

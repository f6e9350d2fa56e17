//! Time utility functions
//!
//! Timestamp boundaries are re-tagged rather than converted: the wall-clock
//! digits the operator picked in their local zone become the same digits in
//! UTC. Log queries compare against those literal digits.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};

/// Wall-clock formats accepted by [`parse_wall_clock`] (seconds resolution)
const WALL_CLOCK_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Re-tag a naive wall-clock value as UTC, dropping sub-second digits
pub fn wall_clock_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    let naive = naive.with_nanosecond(0).unwrap_or(naive);
    naive.and_utc()
}

/// Re-tag a zoned value as UTC keeping its local wall-clock digits.
///
/// `None` clears the boundary and stays `None`.
pub fn normalize_boundary<Tz: TimeZone>(local: Option<DateTime<Tz>>) -> Option<DateTime<Utc>> {
    local.map(|dt| wall_clock_to_utc(dt.naive_local()))
}

/// Parse an operator-supplied wall-clock string.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM`
/// and RFC 3339. For RFC 3339 input the offset is ignored and the written
/// digits are kept.
pub fn parse_wall_clock(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    for format in WALL_CLOCK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.naive_local());
    }
    bail!(
        "Invalid timestamp '{}'. Expected YYYY-MM-DDTHH:MM:SS or RFC 3339",
        input
    )
}

//! Lenient timestamp parsing for uploaded data.
//!
//! Report times arrive as strings from the upload pipeline. Well-formed
//! documents carry RFC 3339, but real uploads commonly use naive local
//! times like `2025-11-12T08:30:00`. Detectors treat an unparseable
//! timestamp as "exclude this row", never as an error.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::Timestamp;

/// Naive formats accepted in addition to RFC 3339. Naive times are
/// interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a raw timestamp string, returning `None` when no accepted
/// format matches.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    None
}

//! Timestamp and identifier helpers shared across the codec, manager, and
//! coordinator.
//!
//! Grounded in the teacher's `core::time` module: a thin set of formatting
//! helpers rather than a full clock abstraction, plus ULIDs for event
//! identifiers. Timestamps here are ISO-8601 UTC (`chrono`), matching the
//! literal requirement in spec.md §4.1 rule 5 and §3's `metadata.created`/
//! `lastModified` fields, rather than the teacher's epoch-seconds-with-`Z`
//! shorthand (that format was sufficient for an audit log; this format must
//! round-trip through a JSON-LD document read by other tools).

use chrono::{DateTime, SecondsFormat, Utc};
use ulid::Ulid;

/// Current time as an ISO-8601 UTC string, e.g. `2026-07-27T18:30:00.000Z`.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 string produced by `now_iso8601` (or any RFC3339
/// string); used by metadata comparisons and the health watchdog.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// A fresh event identifier for status events and broker-style audit
/// trails (sortable, monotonic within the same millisecond tie-break).
pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

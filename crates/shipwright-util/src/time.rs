//! ISO-8601 timestamp formatting shared by Evidence entries, Consequence
//! records, and the RunManifest (spec.md §6 wire format).

use chrono::{DateTime, SecondsFormat, Utc};

/// The current time as a millisecond-precision ISO-8601 string, e.g.
/// `2026-01-01T00:00:00.000Z`.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format an explicit timestamp the same way, for deterministic tests and
/// for replaying evidence supplied by a caller instead of sampling the clock.
pub fn format_iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_millisecond_precision_and_zulu() {
        let s = now_iso8601();
        assert!(s.ends_with('Z'));
        assert!(s.contains('.'));
    }
}

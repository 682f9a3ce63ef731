//! Timestamp helpers shared across the gateway.

use chrono::{DateTime, Utc};

/// Current UTC timestamp, RFC 3339 formatted with millisecond precision.
///
/// Centralized so that fingerprints and fixtures never interpolate raw
/// `Utc::now()` calls (see the approval fingerprint invariant in
/// `flowgate-approval`, which must never include a timestamp).
#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp, falling back to the Unix epoch on error.
///
/// Used when loading transcript/metadata files that may have been hand-edited
/// or truncated by a crash; a malformed timestamp should never fail a load.
#[must_use]
pub fn parse_or_epoch(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::UNIX_EPOCH)
}

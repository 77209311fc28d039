use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

/// Storage encoding for timestamps: fixed-width RFC 3339 in UTC with
/// millisecond precision, so text comparison in SQL matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp. A corrupt value is logged and replaced by the
/// epoch rather than failing the whole read.
pub fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

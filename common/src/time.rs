//! Millisecond timestamp conversions for persisted rows.

use chrono::{DateTime, TimeZone, Utc};

/// Converts a persisted millisecond timestamp back into a UTC instant.
///
/// Returns `None` for values chrono cannot represent.
pub fn from_ms(ts_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_ms).single()
}

pub fn to_ms(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

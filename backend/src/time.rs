use chrono::{DateTime, Utc};

/// Wall-clock instant in UTC.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Human-readable rendering used in log lines, e.g. `16 Oct 2026 - 09:31 UTC`.
pub fn display_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%d %b %Y - %H:%M UTC").to_string()
}

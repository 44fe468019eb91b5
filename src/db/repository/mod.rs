pub mod document;
pub mod extraction;
pub mod interaction;

pub use document::*;
pub use extraction::*;
pub use interaction::*;

use chrono::NaiveDateTime;

/// Stored timestamp format. Fixed-width fractional seconds keep lexicographic
/// column ordering identical to chronological ordering.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or_default()
}

/// Current timestamp as stored in the database.
pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let ts = now();
        let parsed = parse_timestamp(&format_timestamp(&ts));
        // Stored precision is microseconds
        assert_eq!(
            ts.and_utc().timestamp_micros(),
            parsed.and_utc().timestamp_micros()
        );
    }

    #[test]
    fn parse_accepts_iso_t_separator() {
        let parsed = parse_timestamp("2026-03-01T08:30:00");
        assert_eq!(format_timestamp(&parsed), "2026-03-01 08:30:00.000000");
    }
}

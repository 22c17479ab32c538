//! # Temporal Types — UTC-Only Timestamps
//!
//! `Timestamp` is the only time type stored on devices and tasks. It is
//! always UTC and truncated to seconds, so history entries recorded on
//! different hosts render identically (`YYYY-MM-DDTHH:MM:SSZ`).
//!
//! Date-range filters arrive from operators in whatever offset their
//! browser uses; [`Timestamp::parse_lenient()`] converts them to UTC.
//! Stored values are written with [`Timestamp::parse()`], which rejects
//! anything but a `Z` suffix.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FleetError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with a `Z` suffix.
    ///
    /// Explicit offsets, including `+00:00`, are rejected.
    pub fn parse(s: &str) -> Result<Self, FleetError> {
        if !s.ends_with('Z') {
            return Err(FleetError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string in any offset and convert it to UTC.
    ///
    /// A bare `YYYY-MM-DD` date is accepted as midnight UTC, which is how
    /// date-range filters are usually typed.
    pub fn parse_lenient(s: &str) -> Result<Self, FleetError> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| FleetError::Validation(format!("invalid date {s:?}")))?;
            return Ok(Self(midnight.and_utc()));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            FleetError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Like [`Timestamp::parse_lenient()`], but a bare `YYYY-MM-DD` date
    /// resolves to the last second of that day, for inclusive upper bounds.
    pub fn parse_lenient_end(s: &str) -> Result<Self, FleetError> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let end = date
                .and_hms_opt(23, 59, 59)
                .ok_or_else(|| FleetError::Validation(format!("invalid date {s:?}")))?;
            return Ok(Self(end.and_utc()));
        }
        Self::parse_lenient(s)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_parse_z_suffix_accepted() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.to_string(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_offset_rejected() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T08:00:00-04:00").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2026-01-15T09:00:00-03:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_lenient_accepts_bare_date() {
        let ts = Timestamp::parse_lenient("2026-03-01").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-03-01T00:00:00Z");
    }

    #[test]
    fn test_parse_lenient_end_covers_whole_day() {
        let start = Timestamp::parse_lenient("2026-03-01").unwrap();
        let end = Timestamp::parse_lenient_end("2026-03-01").unwrap();
        assert_eq!(end.to_iso8601(), "2026-03-01T23:59:59Z");
        let noon = Timestamp::parse("2026-03-01T12:00:00Z").unwrap();
        assert!(start <= noon && noon <= end);

        let explicit = Timestamp::parse_lenient_end("2026-03-01T10:00:00Z").unwrap();
        assert_eq!(explicit.to_iso8601(), "2026-03-01T10:00:00Z");
        assert!(Timestamp::parse_lenient_end("2026-02-30").is_err());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse_lenient("").is_err());
        assert!(Timestamp::parse_lenient("2026-13-45").is_err());
    }

    #[test]
    fn test_ordering() {
        let earlier = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let later = Timestamp::parse("2026-01-15T12:00:01Z").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }
}

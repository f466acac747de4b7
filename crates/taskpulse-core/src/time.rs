//! Wall-clock helpers.
//!
//! Everything in TaskPulse runs on the local wall clock. The task store
//! speaks ISO-8601 without an offset (`2026-10-16T14:30:00`), but older
//! records carry RFC 3339 timestamps with an offset; both are accepted and
//! normalised to local naive time.

use chrono::{DateTime, Local, NaiveDateTime};

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a task-store timestamp into local wall-clock time.
pub fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Render a wall-clock timestamp the way the task store expects it.
pub fn format_local(at: NaiveDateTime) -> String {
    at.format(WIRE_FORMAT).to_string()
}

/// `M:SS` below one hour, `H:MM:SS` from one hour on.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Serde adapter for optional wall-clock timestamps on the task wire format.
pub mod serde_local_opt {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => serializer.serialize_str(&super::format_local(*at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse_local(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_parse_naive_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_local("2026-10-16T14:30:00"), Some(expected));
        assert_eq!(parse_local("2026-10-16T14:30:00.000"), Some(expected));
        assert_eq!(parse_local("2026-10-16 14:30:00"), Some(expected));
        assert_eq!(parse_local("2026-10-16T14:30"), Some(expected));
        assert_eq!(parse_local("not a time"), None);
    }

    #[test]
    fn test_parse_rfc3339_keeps_instant() {
        let parsed = parse_local("2026-10-16T14:30:00+00:00").unwrap();
        let utc = DateTime::parse_from_rfc3339("2026-10-16T14:30:00+00:00").unwrap();
        assert_eq!(parsed, utc.with_timezone(&Local).naive_local());
        assert_eq!(parsed.second(), 0);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(65), "1:05");
        assert_eq!(format_elapsed(3599), "59:59");
        assert_eq!(format_elapsed(3600), "1:00:00");
        assert_eq!(format_elapsed(3725), "1:02:05");
    }
}

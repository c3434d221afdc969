//! Lenient timestamp parsing.
//!
//! Stored records carry timestamps written by several generations of the application: RFC 3339
//! strings, naive `YYYY-MM-DD HH:MM:SS[.ffffff]` strings, bare dates, and empty strings meaning
//! "unset". Values that cannot be parsed are treated as unset rather than failing the load.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a timestamp in any of the accepted shapes. Naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    parse_date(raw).map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Parses a `YYYY-MM-DD` date, also accepting a full timestamp and keeping its date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// The last second of `now`'s UTC day.
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&now.date_naive().and_time(last))
}

fn optional_raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Other(_)) | None => None,
    })
}

/// `deserialize_with` helper for optional timestamps stored as possibly-empty strings.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_raw(deserializer)?.and_then(|s| parse_timestamp(&s)))
}

/// `deserialize_with` helper for optional dates stored as possibly-empty strings.
pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_raw(deserializer)?.and_then(|s| parse_date(&s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2024-06-10T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-06-10T12:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-06-10 12:34:56.123456").is_some());
        assert!(parse_timestamp("2024-06-10").is_some());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("tomorrow").is_none());

        let offset = parse_timestamp("2024-06-10T12:00:00+02:00").expect("should parse");
        assert_eq!(offset.hour(), 10);
    }

    #[test]
    fn test_end_of_day() {
        let now = parse_timestamp("2024-06-10T08:15:00Z").expect("should parse");
        let eod = end_of_day(now);
        assert_eq!(eod.date_naive().day(), 10);
        assert_eq!((eod.hour(), eod.minute(), eod.second()), (23, 59, 59));
    }

    #[test]
    fn test_optional_deserializers_tolerate_empty_and_garbage() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
            expiry: Option<DateTime<Utc>>,
            #[serde(default, deserialize_with = "deserialize_optional_date")]
            end_date: Option<NaiveDate>,
        }

        let row: Row = serde_json::from_str(r#"{"expiry": "", "end_date": ""}"#).expect("parse");
        assert!(row.expiry.is_none());
        assert!(row.end_date.is_none());

        let row: Row = serde_json::from_str(r#"{"expiry": "garbage", "end_date": null}"#)
            .expect("parse");
        assert!(row.expiry.is_none());
        assert!(row.end_date.is_none());

        let row: Row = serde_json::from_str(r#"{"expiry": "2024-06-10 23:59:59", "end_date": "2024-07-01"}"#)
            .expect("parse");
        assert!(row.expiry.is_some());
        assert_eq!(row.end_date, NaiveDate::from_ymd_opt(2024, 7, 1));
    }
}

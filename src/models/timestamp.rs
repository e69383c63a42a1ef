//! ISO-8601 timestamps in the `2024-05-01T12:00:00.000Z` shape.
//!
//! Any RFC 3339 string or a number of epoch milliseconds is accepted on read.
//! Timestamps are held at millisecond precision so a value read back from the
//! store equals the one that was written.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// The current time, at stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format a timestamp with millisecond precision and a `Z` suffix.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc).trunc_subsecs(3))
}

/// A timestamp as found in stored JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Text(String),
    Millis(i64),
}

impl Wire {
    fn into_timestamp<E: serde::de::Error>(self) -> Result<DateTime<Utc>, E> {
        match self {
            Wire::Text(raw) => {
                parse(&raw).ok_or_else(|| E::custom(format!("invalid timestamp: {}", raw)))
            }
            Wire::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| E::custom(format!("timestamp out of range: {}", ms))),
        }
    }
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    Wire::deserialize(deserializer)?.into_timestamp()
}

/// Same format for optional fields.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Wire;

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<Wire>::deserialize(deserializer)? {
            Some(wire) => wire.into_timestamp().map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_millis_and_z() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format(&ts), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let ts = parse("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(format(&ts), "2024-05-01T12:00:00.000Z");
        assert!(parse("yesterday").is_none());
    }

    #[test]
    fn test_now_round_trips_through_format() {
        let ts = now();
        assert_eq!(parse(&format(&ts)), Some(ts));
        assert_eq!(
            parse("2024-05-01T12:00:00.123456789Z").map(|ts| format(&ts)).as_deref(),
            Some("2024-05-01T12:00:00.123Z")
        );
    }

    #[test]
    fn test_accepts_epoch_millis() {
        #[derive(Deserialize)]
        struct Stamped {
            #[serde(with = "super")]
            at: DateTime<Utc>,
            #[serde(default, with = "super::option")]
            seen: Option<DateTime<Utc>>,
        }

        let stamped: Stamped =
            serde_json::from_str(r#"{"at": 1714564800000, "seen": 1714564800000}"#).unwrap();
        assert_eq!(format(&stamped.at), "2024-05-01T12:00:00.000Z");
        assert_eq!(stamped.seen, Some(stamped.at));
    }
}

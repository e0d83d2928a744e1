//! Serde utilities for feed payloads.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Format used by the feed API for timestamps without a zone designator.
const PLAIN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a timestamp in any of the formats the feed API emits.
///
/// Accepts RFC 3339 with or without fractional seconds, and
/// `YYYY-MM-DDTHH:MM:SS` which is taken as UTC.
#[must_use]
pub fn parse_flexible_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, PLAIN_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Module to handle timestamps that come in several ISO 8601 flavours.
pub mod flexible_datetime {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_flexible_datetime};

    /// Serializes a timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns an error if the serializer fails.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    /// Deserializes a timestamp from any supported string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a string or uses an unsupported format.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_flexible_datetime(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported date format: {raw}")))
    }

    /// Module to handle optional timestamps.
    pub mod option {
        use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_flexible_datetime};

        /// Serializes an optional timestamp.
        ///
        /// # Errors
        ///
        /// Returns an error if the serializer fails.
        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional timestamp. `null` maps to `None`.
        ///
        /// # Errors
        ///
        /// Returns an error if a present value uses an unsupported format.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|value| {
                parse_flexible_datetime(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!("unsupported date format: {value}"))
                })
            })
            .transpose()
        }
    }
}

//! JSON codec helpers shared by user models: the wire timestamp format and
//! stable money comparison.

use chrono::{DateTime, FixedOffset};

use crate::errors::UndoGraphError;

/// Wire format for timestamps: `yyyy-MM-dd HH:mm:ss ZZZZZ` with an explicit
/// numeric offset, e.g. `2020-04-14 01:40:59 +0000`. Bit-exact round-trips
/// are part of the storage contract.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, UndoGraphError> {
    DateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|e| UndoGraphError::codec(format!("bad timestamp {text:?}: {e}")))
}

/// Money-like floats compare as integer cents so equality and hashing stay
/// stable across encode/decode cycles.
pub fn money_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Serde adapter for timestamp fields: `#[serde(with = "undograph::codec::timestamp")]`.
pub mod timestamp {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{TIMESTAMP_FORMAT, format_timestamp};

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
            .map_err(|e| D::Error::custom(format!("bad timestamp {text:?}: {e}")))
    }
}

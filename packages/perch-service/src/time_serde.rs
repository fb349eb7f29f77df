//! Timestamps on the wire are Unix epoch milliseconds.

use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_i64(perch_storage::models::to_unix_ms(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = i64::deserialize(deserializer)?;

	perch_storage::models::from_unix_ms(raw).map_err(serde::de::Error::custom)
}

use time::OffsetDateTime;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}

	pub fn parse(raw: &str) -> Result<Self> {
		match raw {
			"user" => Ok(Self::User),
			"assistant" => Ok(Self::Assistant),
			other => Err(Error::Corrupt(format!("Unknown message role {other:?}."))),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
	pub id: String,
	pub created_at: OffsetDateTime,
	pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub id: String,
	pub conversation_id: String,
	pub role: Role,
	pub text: Option<String>,
	pub image_path: Option<String>,
	pub image_name: Option<String>,
	/// Serialized citation list, stored verbatim.
	pub citations_json: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
	pub id: String,
	pub created_at: OffsetDateTime,
	pub title: Option<String>,
	pub first_user_text: Option<String>,
	/// Newest message timestamp, or `created_at` for a conversation without messages.
	pub last_updated_at: OffsetDateTime,
}

/// Timestamps are persisted as Unix epoch milliseconds.
pub fn to_unix_ms(ts: OffsetDateTime) -> i64 {
	(ts.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_unix_ms(ms: i64) -> Result<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
		.map_err(|err| Error::Corrupt(format!("Timestamp {ms} is out of range: {err}.")))
}

/// Drops sub-millisecond precision so a value survives a round trip through storage unchanged.
pub fn truncate_to_ms(ts: OffsetDateTime) -> OffsetDateTime {
	from_unix_ms(to_unix_ms(ts)).unwrap_or(ts)
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use perch_domain::citation::Citation;
use perch_storage::{blobs, models::Message};

/// Route under which stored images are served back.
pub const UPLOADS_ROUTE: &str = "/api/uploads";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
	pub id: String,
	pub role: String,
	pub text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub citations: Option<Vec<Citation>>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Message> for MessageDto {
	fn from(message: Message) -> Self {
		let citations = decode_citations(message.citations_json.as_deref());

		Self {
			id: message.id,
			role: message.role.as_str().to_string(),
			text: message.text,
			image_url: message.image_path.as_deref().map(image_url),
			image_name: message.image_name,
			citations,
			created_at: message.created_at,
		}
	}
}

pub fn image_url(reference: &str) -> String {
	format!("{UPLOADS_ROUTE}/{}", blobs::name_from_ref(reference))
}

/// Malformed stored citations read as absent.
pub fn decode_citations(raw: Option<&str>) -> Option<Vec<Citation>> {
	let raw = raw?;

	match serde_json::from_str(raw) {
		Ok(citations) => Some(citations),
		Err(err) => {
			tracing::warn!(error = %err, "Ignoring malformed stored citations.");

			None
		},
	}
}

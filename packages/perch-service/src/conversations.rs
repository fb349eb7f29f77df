use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use perch_domain::title;
use perch_storage::queries;

use crate::{PerchService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryDto {
	pub id: String,
	pub title: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub last_updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListResponse {
	pub conversations: Vec<ConversationSummaryDto>,
}

impl PerchService {
	/// Conversations ordered by latest activity, newest first.
	pub async fn list_conversations(&self) -> Result<ConversationListResponse> {
		let conversations = queries::list_conversations(&self.db)
			.await?
			.into_iter()
			.map(|summary| ConversationSummaryDto {
				title: title::derive(summary.title.as_deref(), summary.first_user_text.as_deref()),
				id: summary.id,
				created_at: summary.created_at,
				last_updated_at: summary.last_updated_at,
			})
			.collect();

		Ok(ConversationListResponse { conversations })
	}
}

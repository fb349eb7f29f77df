use serde::{Deserialize, Serialize};

use perch_storage::queries;

use crate::{Error, MessageDto, PerchService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
	pub conversation_id: String,
	pub messages: Vec<MessageDto>,
}

impl PerchService {
	/// Full ordered history of one conversation.
	pub async fn history(&self, conversation_id: Option<&str>) -> Result<HistoryResponse> {
		let Some(conversation_id) =
			conversation_id.map(str::trim).filter(|id| !id.is_empty())
		else {
			return Err(Error::validation("conversationId is required."));
		};

		if queries::get_conversation(&self.db, conversation_id).await?.is_none() {
			return Err(Error::NotFound {
				message: format!("Conversation {conversation_id} does not exist."),
			});
		}

		let messages = queries::list_messages(&self.db, conversation_id)
			.await?
			.into_iter()
			.map(MessageDto::from)
			.collect();

		Ok(HistoryResponse { conversation_id: conversation_id.to_string(), messages })
	}
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use perch_domain::{
	citation,
	prompt::{self, PromptInput},
};
use perch_providers::{completion::ChatMessage, retrieval::SearchOutcome};
use perch_storage::{
	models::{self, Conversation, Message, Role},
	queries,
};

use crate::{Error, ImageUpload, MessageDto, PerchService, Result};

#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
	pub conversation_id: Option<String>,
	pub text: Option<String>,
	pub image: Option<ImageUpload>,
}

/// Machine-readable reason a reply was produced on a degraded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedCause {
	FallbackQuery,
	RetrievalOffline,
	CompletionFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
	pub conversation_id: String,
	pub user_message: MessageDto,
	pub assistant_message: MessageDto,
	pub used_fallback_query: bool,
	pub degraded: Vec<DegradedCause>,
}

struct Reply {
	text: String,
	completion_failed: bool,
}

impl PerchService {
	/// Runs one turn: persists the user message, grounds and generates the reply, persists it and
	/// returns both messages as read back from the store.
	pub async fn handle_turn(&self, req: TurnRequest) -> Result<TurnResponse> {
		let text = req.text.as_deref().map(str::trim).filter(|text| !text.is_empty());

		if text.is_none() && req.image.is_none() {
			return Err(Error::validation("Message text or an image is required."));
		}

		let requested_id =
			req.conversation_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

		if let Some(id) = requested_id
			&& queries::get_conversation(&self.db, id).await?.is_none()
		{
			return Err(Error::NotFound { message: format!("Conversation {id} does not exist.") });
		}
		if let Some(image) = &req.image {
			image.validate()?;
		}

		let now = models::truncate_to_ms(OffsetDateTime::now_utc());
		let conversation_id = match requested_id {
			Some(id) => id.to_string(),
			None => self.create_conversation(now).await?,
		};
		let (query, used_fallback_query) = match text {
			Some(text) => (text, false),
			None => (self.cfg.chat.fallback_query.as_str(), true),
		};
		let (user_message, outcome) = tokio::join!(
			self.append_user_message(&conversation_id, text, req.image.as_ref()),
			self.providers.retrieval.search(
				&self.cfg.providers.retrieval,
				query,
				self.cfg.chat.retrieval_k
			),
		);
		let (user_message_id, user_at) = user_message?;

		if outcome.is_offline() {
			tracing::warn!(
				conversation_id = %conversation_id,
				reason = %outcome.offline_message,
				"Retrieval is unavailable. Continuing without grounding."
			);
		}

		let reply =
			self.generate_reply(text, req.image.as_ref(), &outcome, used_fallback_query).await;
		let citations_json = serde_json::to_string(&outcome.citations).map_err(|err| {
			Error::Storage { message: format!("Failed to encode citations: {err}") }
		})?;
		let assistant_at = models::truncate_to_ms(OffsetDateTime::now_utc()).max(user_at);
		let assistant = Message {
			id: Uuid::new_v4().to_string(),
			conversation_id: conversation_id.clone(),
			role: Role::Assistant,
			text: Some(reply.text),
			image_path: None,
			image_name: None,
			citations_json: Some(citations_json),
			created_at: assistant_at,
		};
		let assistant_at = queries::insert_message(&self.db, &assistant).await?;

		tracing::debug!(
			conversation_id = %conversation_id,
			user_at = models::to_unix_ms(user_at),
			assistant_at = models::to_unix_ms(assistant_at),
			"Stored turn messages."
		);

		let user_message = self.read_back(&user_message_id).await?;
		let assistant_message = self.read_back(&assistant.id).await?;
		let mut degraded = Vec::new();

		if used_fallback_query {
			degraded.push(DegradedCause::FallbackQuery);
		}
		if outcome.is_offline() {
			degraded.push(DegradedCause::RetrievalOffline);
		}
		if reply.completion_failed {
			degraded.push(DegradedCause::CompletionFailed);
		}

		tracing::info!(
			conversation_id = %conversation_id,
			citations = outcome.citations.len(),
			degraded = ?degraded,
			"Turn completed."
		);

		Ok(TurnResponse {
			conversation_id,
			user_message: user_message.into(),
			assistant_message: assistant_message.into(),
			used_fallback_query,
			degraded,
		})
	}

	async fn create_conversation(&self, now: OffsetDateTime) -> Result<String> {
		let conversation =
			Conversation { id: Uuid::new_v4().to_string(), created_at: now, title: None };

		queries::insert_conversation(&self.db, &conversation).await?;
		tracing::debug!(conversation_id = %conversation.id, "Created conversation.");
		Ok(conversation.id)
	}

	async fn append_user_message(
		&self,
		conversation_id: &str,
		text: Option<&str>,
		image: Option<&ImageUpload>,
	) -> Result<(String, OffsetDateTime)> {
		let ingested = match image {
			Some(upload) => Some(self.ingest_image(upload).await?),
			None => None,
		};
		let (image_path, image_name) = match ingested {
			Some(image) => (Some(image.reference), Some(image.name)),
			None => (None, None),
		};
		let message = Message {
			id: Uuid::new_v4().to_string(),
			conversation_id: conversation_id.to_string(),
			role: Role::User,
			text: text.map(str::to_string),
			image_path,
			image_name,
			citations_json: None,
			created_at: models::truncate_to_ms(OffsetDateTime::now_utc()),
		};
		let created_at = queries::insert_message(&self.db, &message).await?;

		Ok((message.id, created_at))
	}

	async fn generate_reply(
		&self,
		text: Option<&str>,
		image: Option<&ImageUpload>,
		outcome: &SearchOutcome,
		used_fallback_query: bool,
	) -> Reply {
		let citations_text = citation::citations_text(&outcome.citations);
		let input = PromptInput {
			context_text: &outcome.context_text,
			citations_text: &citations_text,
			offline_message: &outcome.offline_message,
			used_fallback_query,
			fallback_query: &self.cfg.chat.fallback_query,
		};
		let user_content = match (text, image) {
			(Some(text), _) => text.to_string(),
			(None, Some(image)) => format!(
				"The user sent an image named \"{}\" without any text. Describe what can be said \
				 about it from the context.",
				image.display_name()
			),
			(None, None) => String::new(),
		};
		let messages =
			[ChatMessage::system(prompt::compose(&input)), ChatMessage::user(user_content)];

		match self.providers.completion.complete(&self.cfg.providers.completion, &messages).await {
			Ok(mut answer) => {
				if used_fallback_query {
					answer.push_str("\n\n");
					answer.push_str(&prompt::fallback_note(&self.cfg.chat.fallback_query));
				}

				Reply { text: answer, completion_failed: false }
			},
			Err(err) => {
				tracing::warn!(error = %err, "Completion failed. Using the local reply.");
				let mut stub = prompt::compose_stub(&input, &outcome.citations);
				stub.push_str("\n\n");
				stub.push_str(&prompt::fallback_suffix(&err.to_string()));

				Reply { text: stub, completion_failed: true }
			},
		}
	}

	async fn read_back(&self, message_id: &str) -> Result<Message> {
		match queries::get_message(&self.db, message_id).await {
			Ok(Some(message)) => Ok(message),
			Ok(None) => {
				tracing::error!(message_id, "Message is missing after write.");

				Err(Error::Persistence {
					message: format!("Message {message_id} could not be read back after write."),
				})
			},
			Err(err) => {
				tracing::error!(message_id, error = %err, "Failed to read back message.");

				Err(Error::Persistence {
					message: format!("Failed to read back message {message_id}: {err}"),
				})
			},
		}
	}
}

use sqlx::{Row, sqlite::SqliteRow};
use time::OffsetDateTime;

use crate::{
	Error, Result,
	db::Db,
	models::{self, Conversation, ConversationSummary, Message, Role},
};

pub async fn insert_conversation(db: &Db, conversation: &Conversation) -> Result<()> {
	let result = sqlx::query(
		"\
INSERT INTO conversations (id, created_at, title)
VALUES (?1, ?2, ?3)",
	)
	.bind(conversation.id.as_str())
	.bind(models::to_unix_ms(conversation.created_at))
	.bind(conversation.title.as_deref())
	.execute(&db.pool)
	.await;

	match result {
		Ok(_) => Ok(()),
		Err(sqlx::Error::Database(err)) if err.is_unique_violation() =>
			Err(Error::Conflict(format!("Conversation {} already exists.", conversation.id))),
		Err(err) => Err(err.into()),
	}
}

pub async fn get_conversation(db: &Db, id: &str) -> Result<Option<Conversation>> {
	let row = sqlx::query(
		"\
SELECT id, created_at, title
FROM conversations
WHERE id = ?1",
	)
	.bind(id)
	.fetch_optional(&db.pool)
	.await?;

	row.map(|row| -> Result<Conversation> {
		Ok(Conversation {
			id: row.try_get("id")?,
			created_at: models::from_unix_ms(row.try_get("created_at")?)?,
			title: row.try_get("title")?,
		})
	})
	.transpose()
}

/// Appends one message and returns its stored timestamp. The store stamps the row with the later
/// of `message.created_at` and the newest timestamp already in the conversation, inside the same
/// write, so append order always matches timestamp order.
pub async fn insert_message(db: &Db, message: &Message) -> Result<OffsetDateTime> {
	let row = sqlx::query(
		"\
INSERT INTO messages (
	id,
	conversation_id,
	role,
	text,
	image_path,
	image_name,
	citations_json,
	created_at
)
SELECT
	?1,
	?2,
	?3,
	?4,
	?5,
	?6,
	?7,
	MAX(?8, COALESCE((SELECT MAX(created_at) FROM messages WHERE conversation_id = ?2), ?8))
RETURNING created_at",
	)
	.bind(message.id.as_str())
	.bind(message.conversation_id.as_str())
	.bind(message.role.as_str())
	.bind(message.text.as_deref())
	.bind(message.image_path.as_deref())
	.bind(message.image_name.as_deref())
	.bind(message.citations_json.as_deref())
	.bind(models::to_unix_ms(message.created_at))
	.fetch_one(&db.pool)
	.await?;

	models::from_unix_ms(row.try_get("created_at")?)
}

pub async fn get_message(db: &Db, id: &str) -> Result<Option<Message>> {
	let row = sqlx::query(
		"\
SELECT id, conversation_id, role, text, image_path, image_name, citations_json, created_at
FROM messages
WHERE id = ?1",
	)
	.bind(id)
	.fetch_optional(&db.pool)
	.await?;

	row.as_ref().map(message_from_row).transpose()
}

/// Messages ordered by timestamp, ties broken by insertion order.
pub async fn list_messages(db: &Db, conversation_id: &str) -> Result<Vec<Message>> {
	let rows = sqlx::query(
		"\
SELECT id, conversation_id, role, text, image_path, image_name, citations_json, created_at
FROM messages
WHERE conversation_id = ?1
ORDER BY created_at ASC, rowid ASC",
	)
	.bind(conversation_id)
	.fetch_all(&db.pool)
	.await?;

	rows.iter().map(message_from_row).collect()
}

/// Conversations ordered by most recent activity, newest first.
pub async fn list_conversations(db: &Db) -> Result<Vec<ConversationSummary>> {
	let rows = sqlx::query(
		"\
SELECT
	c.id,
	c.created_at,
	c.title,
	COALESCE(MAX(m.created_at), c.created_at) AS last_updated_at,
	(
		SELECT f.text
		FROM messages f
		WHERE f.conversation_id = c.id AND f.role = 'user'
		ORDER BY f.created_at ASC, f.rowid ASC
		LIMIT 1
	) AS first_user_text
FROM conversations c
LEFT JOIN messages m ON m.conversation_id = c.id
GROUP BY c.id
ORDER BY last_updated_at DESC, c.rowid DESC",
	)
	.fetch_all(&db.pool)
	.await?;

	rows.iter()
		.map(|row| -> Result<ConversationSummary> {
			Ok(ConversationSummary {
				id: row.try_get("id")?,
				created_at: models::from_unix_ms(row.try_get("created_at")?)?,
				title: row.try_get("title")?,
				first_user_text: row.try_get("first_user_text")?,
				last_updated_at: models::from_unix_ms(row.try_get("last_updated_at")?)?,
			})
		})
		.collect()
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
	let role: String = row.try_get("role")?;

	Ok(Message {
		id: row.try_get("id")?,
		conversation_id: row.try_get("conversation_id")?,
		role: Role::parse(&role)?,
		text: row.try_get("text")?,
		image_path: row.try_get("image_path")?,
		image_name: row.try_get("image_name")?,
		citations_json: row.try_get("citations_json")?,
		created_at: models::from_unix_ms(row.try_get("created_at")?)?,
	})
}

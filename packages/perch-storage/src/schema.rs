pub const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS conversations (
	id TEXT PRIMARY KEY,
	created_at INTEGER NOT NULL,
	title TEXT
);

CREATE TABLE IF NOT EXISTS messages (
	id TEXT PRIMARY KEY,
	conversation_id TEXT NOT NULL REFERENCES conversations (id) ON DELETE CASCADE,
	role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
	text TEXT,
	image_path TEXT,
	image_name TEXT,
	citations_json TEXT,
	created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_conversation_created_idx
	ON messages (conversation_id, created_at);
";

pub fn statements() -> impl Iterator<Item = &'static str> {
	SCHEMA.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

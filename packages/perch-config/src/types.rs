use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound for a whole request body, multipart framing included.
	#[serde(default = "default_max_request_bytes")]
	pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub sqlite: Sqlite,
	pub uploads: Uploads,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sqlite {
	/// Database file path. `:memory:` keeps everything in process.
	pub path: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uploads {
	pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub retrieval: RetrievalProviderConfig,
	pub completion: CompletionProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalProviderConfig {
	pub api_base: String,
	#[serde(default = "default_retrieval_path")]
	pub path: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionProviderConfig {
	pub api_base: String,
	#[serde(default = "default_completion_path")]
	pub path: String,
	pub api_key: Option<String>,
	pub model: String,
	pub max_tokens: u32,
	pub temperature: f32,
	/// Hard deadline for one completion call. Must not exceed 60 seconds.
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Chat {
	/// Query sent to retrieval when a turn carries an image but no text.
	pub fallback_query: String,
	pub retrieval_k: u32,
}
impl Default for Chat {
	fn default() -> Self {
		Self { fallback_query: "bird".to_string(), retrieval_k: 5 }
	}
}

fn default_max_request_bytes() -> usize {
	16 * 1_024 * 1_024
}

fn default_retrieval_path() -> String {
	"/search".to_string()
}

fn default_completion_path() -> String {
	"/v1/chat/completions".to_string()
}

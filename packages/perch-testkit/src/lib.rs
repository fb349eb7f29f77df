use std::{
	env, fs,
	path::{Path, PathBuf},
};

use serde_json::Map;
use uuid::Uuid;

use perch_config::{
	Chat, CompletionProviderConfig, Config, Providers, RetrievalProviderConfig, Service, Sqlite,
	Storage, Uploads,
};

/// Collaborator address that refuses connections.
pub const UNREACHABLE_API_BASE: &str = "http://127.0.0.1:1";

const SQLITE_SIDECARS: [&str; 3] = ["", "-wal", "-shm"];

/// A throwaway SQLite database file, deleted together with its WAL sidecars on drop.
pub struct TestDatabase {
	name: String,
	path: PathBuf,
}
impl TestDatabase {
	pub fn new() -> Self {
		let name = format!("perch_test_{}", Uuid::new_v4().simple());
		let path = env::temp_dir().join(format!("{name}.db"));

		Self { name, path }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn sqlite_config(&self) -> Sqlite {
		Sqlite { path: self.path.to_string_lossy().into_owned(), pool_max_conns: 4 }
	}
}
impl Default for TestDatabase {
	fn default() -> Self {
		Self::new()
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		for suffix in SQLITE_SIDECARS {
			let mut path = self.path.clone().into_os_string();
			path.push(suffix);

			if let Err(err) = fs::remove_file(&path)
				&& err.kind() != std::io::ErrorKind::NotFound
			{
				eprintln!("Test database cleanup failed for {path:?}: {err}.");
			}
		}
	}
}

/// A scratch directory removed recursively on drop. It is not created up front.
pub struct ScratchDir {
	path: PathBuf,
}
impl ScratchDir {
	pub fn new(prefix: &str) -> Self {
		let path = env::temp_dir().join(format!("{prefix}_{}", Uuid::new_v4().simple()));

		Self { path }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Number of regular files directly inside the directory.
	pub fn file_count(&self) -> usize {
		fs::read_dir(&self.path)
			.map(|entries| {
				entries
					.filter_map(Result::ok)
					.filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
					.count()
			})
			.unwrap_or(0)
	}
}
impl Drop for ScratchDir {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_dir_all(&self.path)
			&& err.kind() != std::io::ErrorKind::NotFound
		{
			eprintln!("Scratch directory cleanup failed for {:?}: {err}.", self.path);
		}
	}
}

/// Full config pointing both collaborators at `retrieval_base` and `completion_base`.
pub fn test_config(
	db: &TestDatabase,
	uploads: &ScratchDir,
	retrieval_base: &str,
	completion_base: &str,
) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			max_request_bytes: 16 * 1_024 * 1_024,
		},
		storage: Storage {
			sqlite: db.sqlite_config(),
			uploads: Uploads { dir: uploads.path().to_string_lossy().into_owned() },
		},
		providers: Providers {
			retrieval: RetrievalProviderConfig {
				api_base: retrieval_base.to_string(),
				path: "/search".to_string(),
				timeout_ms: 1_000,
			},
			completion: CompletionProviderConfig {
				api_base: completion_base.to_string(),
				path: "/v1/chat/completions".to_string(),
				api_key: None,
				model: "test-model".to_string(),
				max_tokens: 64,
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		chat: Chat::default(),
	}
}

/// Smallest valid PNG header padded to `len` bytes. Only the declared content type is checked
/// downstream, so the payload does not need to decode.
pub fn png_bytes(len: usize) -> Vec<u8> {
	let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
	bytes.resize(len.max(bytes.len()), 0);

	bytes
}

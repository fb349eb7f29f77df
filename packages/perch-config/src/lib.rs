mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chat, CompletionProviderConfig, Config, Providers, RetrievalProviderConfig, Service, Sqlite,
	Storage, Uploads,
};

use std::{fs, net::SocketAddr, path::Path};

/// Completion calls are never allowed to wait longer than this.
pub const MAX_COMPLETION_TIMEOUT_MS: u64 = 60_000;

// A 5 MiB image plus multipart framing must fit in one request.
const MIN_REQUEST_BYTES: usize = 6 * 1_024 * 1_024;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;
	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.parse::<SocketAddr>().is_err() {
		return Err(Error::validation("service.http_bind must be a socket address."));
	}
	if cfg.service.max_request_bytes < MIN_REQUEST_BYTES {
		return Err(Error::validation(format!(
			"service.max_request_bytes must be at least {MIN_REQUEST_BYTES}."
		)));
	}
	if cfg.storage.sqlite.path.trim().is_empty() {
		return Err(Error::validation("storage.sqlite.path must be non-empty."));
	}
	if cfg.storage.sqlite.pool_max_conns == 0 {
		return Err(Error::validation("storage.sqlite.pool_max_conns must be greater than zero."));
	}
	if cfg.storage.uploads.dir.trim().is_empty() {
		return Err(Error::validation("storage.uploads.dir must be non-empty."));
	}

	for (label, base, path) in [
		("retrieval", &cfg.providers.retrieval.api_base, &cfg.providers.retrieval.path),
		("completion", &cfg.providers.completion.api_base, &cfg.providers.completion.path),
	] {
		if base.trim().is_empty() {
			return Err(Error::validation(format!(
				"providers.{label}.api_base must be non-empty."
			)));
		}
		if !path.starts_with('/') {
			return Err(Error::validation(format!(
				"providers.{label}.path must start with '/'."
			)));
		}
	}

	if cfg.providers.retrieval.timeout_ms == 0 {
		return Err(Error::validation(
			"providers.retrieval.timeout_ms must be greater than zero.",
		));
	}

	let completion = &cfg.providers.completion;

	if completion.model.trim().is_empty() {
		return Err(Error::validation("providers.completion.model must be non-empty."));
	}
	if completion.max_tokens == 0 {
		return Err(Error::validation(
			"providers.completion.max_tokens must be greater than zero.",
		));
	}
	if !completion.temperature.is_finite() || completion.temperature < 0.0 {
		return Err(Error::validation(
			"providers.completion.temperature must be a finite number of zero or greater.",
		));
	}
	if completion.timeout_ms == 0 || completion.timeout_ms > MAX_COMPLETION_TIMEOUT_MS {
		return Err(Error::validation(format!(
			"providers.completion.timeout_ms must be in the range 1-{MAX_COMPLETION_TIMEOUT_MS}."
		)));
	}
	if completion.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::validation(
			"providers.completion.default_headers values must be strings.",
		));
	}
	if cfg.chat.fallback_query.trim().is_empty() {
		return Err(Error::validation("chat.fallback_query must be non-empty."));
	}
	if cfg.chat.retrieval_k == 0 {
		return Err(Error::validation("chat.retrieval_k must be greater than zero."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for base in
		[&mut cfg.providers.retrieval.api_base, &mut cfg.providers.completion.api_base]
	{
		let trimmed = base.trim().trim_end_matches('/').to_string();
		*base = trimmed;
	}

	if cfg.providers.completion.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		cfg.providers.completion.api_key = None;
	}

	cfg.chat.fallback_query = cfg.chat.fallback_query.trim().to_string();
}

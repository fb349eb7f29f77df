use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use perch_config::{CompletionProviderConfig, MAX_COMPLETION_TIMEOUT_MS};
use perch_domain::citation;

/// Longest upstream error body carried into [`Error::Completion`]. The full body is only logged.
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	System,
	User,
	Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: ChatRole,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: ChatRole::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: ChatRole::User, content: content.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
	pub max_tokens: u32,
	pub temperature: f32,
}
impl From<&CompletionProviderConfig> for CompletionOptions {
	fn from(cfg: &CompletionProviderConfig) -> Self {
		Self { max_tokens: cfg.max_tokens, temperature: cfg.temperature }
	}
}

pub async fn complete(
	cfg: &CompletionProviderConfig,
	messages: &[ChatMessage],
	options: CompletionOptions,
) -> Result<String> {
	let timeout_ms = cfg.timeout_ms.min(MAX_COMPLETION_TIMEOUT_MS);
	let client = Client::builder()
		.timeout(Duration::from_millis(timeout_ms))
		.build()
		.map_err(|err| completion_error(format!("Failed to build completion client: {err}")))?;
	let headers = crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)
		.map_err(|err| completion_error(format!("Invalid completion headers: {err}")))?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"messages": messages,
		"max_tokens": options.max_tokens,
		"temperature": options.temperature,
	});
	let res = client.post(url).headers(headers).json(&body).send().await.map_err(|err| {
		if err.is_timeout() {
			completion_error(format!("Completion request timed out after {timeout_ms} ms."))
		} else {
			completion_error(format!("Completion request failed: {err}"))
		}
	})?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();
		tracing::warn!(
			status = status.as_u16(),
			body = %body,
			"Completion service returned an error."
		);

		let detail = if body.trim().is_empty() {
			status.canonical_reason().unwrap_or("no body").to_string()
		} else {
			citation::condense(&body, MAX_ERROR_DETAIL_CHARS)
		};

		return Err(completion_error(format!(
			"Completion service error ({}): {detail}",
			status.as_u16()
		)));
	}

	let json: Value = res
		.json()
		.await
		.map_err(|err| completion_error(format!("Completion response is not valid JSON: {err}")))?;

	parse_completion_response(&json)
}

fn parse_completion_response(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::trim)
		.unwrap_or_default();

	if content.is_empty() {
		return Err(completion_error("Completion service returned an empty response."));
	}

	Ok(content.to_string())
}

fn completion_error(message: impl Into<String>) -> Error {
	Error::Completion { message: message.into() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_trimmed_first_choice() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "  Finches eat seeds.\n" } },
				{ "message": { "content": "ignored" } }
			]
		});

		let content =
			parse_completion_response(&json).expect("Failed to parse completion response.");

		assert_eq!(content, "Finches eat seeds.");
	}

	#[test]
	fn blank_content_is_a_failure() {
		let json = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] });

		assert!(matches!(parse_completion_response(&json), Err(Error::Completion { .. })));
	}

	#[test]
	fn missing_choices_is_a_failure() {
		let json = serde_json::json!({ "id": "x" });

		assert!(matches!(parse_completion_response(&json), Err(Error::Completion { .. })));
	}
}

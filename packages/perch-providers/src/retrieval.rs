use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use perch_config::RetrievalProviderConfig;
use perch_domain::citation::{self, Citation, RawPassage};

pub const OFFLINE_MESSAGE: &str = "Retrieval server is offline.";
pub const INVALID_RESPONSE_MESSAGE: &str = "Retrieval server returned an invalid response.";

/// Result of one search. An unreachable service is reported through `offline_message`, never as
/// an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOutcome {
	pub citations: Vec<Citation>,
	pub context_text: String,
	pub offline_message: String,
}
impl SearchOutcome {
	pub fn offline(message: impl Into<String>) -> Self {
		Self { citations: Vec::new(), context_text: String::new(), offline_message: message.into() }
	}

	pub fn is_offline(&self) -> bool {
		!self.offline_message.is_empty()
	}
}

pub async fn search(cfg: &RetrievalProviderConfig, query: &str, k: u32) -> SearchOutcome {
	let client = match Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build() {
		Ok(client) => client,
		Err(err) => {
			tracing::warn!(error = %err, "Failed to build retrieval client.");

			return SearchOutcome::offline(OFFLINE_MESSAGE);
		},
	};
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = match client
		.get(url)
		.query(&[("q", query.to_string()), ("k", k.to_string())])
		.send()
		.await
	{
		Ok(res) => res,
		Err(err) => {
			tracing::warn!(error = %err, "Retrieval request failed.");

			return SearchOutcome::offline(OFFLINE_MESSAGE);
		},
	};
	let status = res.status();

	if !status.is_success() {
		tracing::warn!(%status, "Retrieval server returned a non-success status.");

		return SearchOutcome::offline(format!(
			"Retrieval server returned an error (status {}).",
			status.as_u16()
		));
	}

	let json: Value = match res.json().await {
		Ok(json) => json,
		Err(err) => {
			tracing::warn!(error = %err, "Retrieval response is not valid JSON.");

			return SearchOutcome::offline(INVALID_RESPONSE_MESSAGE);
		},
	};
	let citations = parse_search_response(&json);

	tracing::debug!(count = citations.len(), "Retrieval returned citations.");

	SearchOutcome {
		context_text: citation::context_text(&citations),
		citations,
		offline_message: String::new(),
	}
}

/// Normalizes `results` in the order the service ranked them. A missing or non-array `results`
/// field yields no citations.
pub fn parse_search_response(json: &Value) -> Vec<Citation> {
	let Some(results) = json.get("results").and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	results
		.iter()
		.enumerate()
		.map(|(index, item)| citation::normalize(&raw_passage(item), index))
		.collect()
}

fn raw_passage(item: &Value) -> RawPassage {
	let text_field = |key: &str| item.get(key).and_then(|v| v.as_str()).map(str::to_string);

	RawPassage {
		doc_id: text_field("doc_id"),
		title: text_field("title"),
		url: text_field("url"),
		text: text_field("text"),
		score: item.get("score").and_then(|v| v.as_f64()),
	}
}

use serde::{Deserialize, Serialize};

pub const MAX_SNIPPET_CHARS: usize = 220;
pub const UNTITLED_SOURCE: &str = "Untitled source";

const ELLIPSIS: char = '…';

/// A retrieved passage as shown next to an assistant reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	pub id: String,
	pub title: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	pub snippet: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
}

/// One raw hit from the retrieval collaborator, before normalization.
#[derive(Clone, Debug, Default)]
pub struct RawPassage {
	pub doc_id: Option<String>,
	pub title: Option<String>,
	pub url: Option<String>,
	pub text: Option<String>,
	pub score: Option<f64>,
}

pub fn normalize(raw: &RawPassage, index: usize) -> Citation {
	let title = non_blank(raw.title.as_deref()).unwrap_or(UNTITLED_SOURCE).to_string();
	let url = non_blank(raw.url.as_deref()).map(str::to_string);
	let snippet = build_snippet(raw.text.as_deref().unwrap_or_default());

	Citation { id: stable_id(raw, index), title, url, snippet, score: raw.score }
}

/// Collapses whitespace runs and truncates to [`MAX_SNIPPET_CHARS`] characters, marking the cut
/// with an ellipsis.
pub fn build_snippet(text: &str) -> String {
	condense(text, MAX_SNIPPET_CHARS)
}

/// Collapses whitespace runs and truncates to `max_chars` characters plus an ellipsis.
pub fn condense(text: &str, max_chars: usize) -> String {
	let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
	if normalized.chars().count() <= max_chars {
		return normalized;
	}

	let mut out: String = normalized.chars().take(max_chars).collect();
	out.push(ELLIPSIS);
	out
}

/// Source document id when the collaborator supplies one, otherwise a content hash that includes
/// the rank position so identical passages at different ranks stay distinct.
pub fn stable_id(raw: &RawPassage, index: usize) -> String {
	if let Some(doc_id) = non_blank(raw.doc_id.as_deref()) {
		return doc_id.to_string();
	}

	let seed = format!(
		"{}|{}|{}|{index}",
		raw.title.as_deref().unwrap_or_default(),
		raw.url.as_deref().unwrap_or_default(),
		raw.text.as_deref().unwrap_or_default(),
	);

	blake3::hash(seed.as_bytes()).to_hex().to_string()
}

/// Non-empty snippets in rank order, separated by blank lines.
pub fn context_text(citations: &[Citation]) -> String {
	citations
		.iter()
		.map(|citation| citation.snippet.as_str())
		.filter(|snippet| !snippet.is_empty())
		.collect::<Vec<_>>()
		.join("\n\n")
}

/// Numbered source list, `[n] Title (url)`, one per line. Indices start at 1.
pub fn citations_text(citations: &[Citation]) -> String {
	citations
		.iter()
		.enumerate()
		.map(|(idx, citation)| match citation.url.as_deref() {
			Some(url) => format!("[{}] {} ({url})", idx + 1, citation.title),
			None => format!("[{}] {}", idx + 1, citation.title),
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

//! System prompts for the completion collaborator and the locally rendered replies used when it
//! cannot be reached.

use crate::citation::Citation;

/// Appended to every reply produced without the completion collaborator.
pub const FALLBACK_MARKER: &str = "[offline reply]";

pub struct PromptInput<'a> {
	pub context_text: &'a str,
	pub citations_text: &'a str,
	pub offline_message: &'a str,
	pub used_fallback_query: bool,
	pub fallback_query: &'a str,
}

pub fn compose(input: &PromptInput<'_>) -> String {
	let mut prompt =
		String::from("You are a helpful assistant that answers questions about the user's turn.");

	if !input.offline_message.is_empty() {
		prompt.push_str(&format!(
			"\n\nThe document search service is unavailable: {} \
			 Answer from general knowledge and say that no sources could be consulted.",
			input.offline_message
		));

		return prompt;
	}
	if input.context_text.is_empty() {
		prompt.push_str("\n\nNo relevant documents were found. Answer from general knowledge.");

		if input.used_fallback_query {
			prompt.push('\n');
			prompt.push_str(&fallback_instruction(input.fallback_query));
		}

		return prompt;
	}

	prompt.push_str(
		"\n\nAnswer using the context below. Cite sources inline with bracketed indices such as \
		 [1] that match the numbered source list. If the context does not answer the question, \
		 say so.",
	);

	if input.used_fallback_query {
		prompt.push('\n');
		prompt.push_str(&fallback_instruction(input.fallback_query));
	}

	prompt.push_str("\n\nContext:\n");
	prompt.push_str(input.context_text);
	prompt.push_str("\n\nSources:\n");
	prompt.push_str(input.citations_text);

	prompt
}

/// Renders a direct answer for the user from retrieval output alone.
pub fn compose_stub(input: &PromptInput<'_>, citations: &[Citation]) -> String {
	let mut reply = String::new();

	if !input.offline_message.is_empty() {
		reply.push_str(&format!(
			"I couldn't search the document collection right now. {}",
			input.offline_message
		));
	} else if input.context_text.is_empty() {
		reply.push_str("I couldn't find any matching documents for this message.");
	} else {
		reply.push_str("Here is what the retrieved sources say:\n");

		for (idx, citation) in citations.iter().enumerate() {
			if citation.snippet.is_empty() {
				continue;
			}

			reply.push_str(&format!("\n[{}] {}", idx + 1, citation.snippet));
		}

		reply.push_str("\n\nSources:\n");
		reply.push_str(input.citations_text);
	}

	if input.used_fallback_query {
		reply.push_str("\n\n");
		reply.push_str(&fallback_note(input.fallback_query));
	}

	reply
}

/// User-facing note that the search ran on the configured fallback query.
pub fn fallback_note(fallback_query: &str) -> String {
	format!(
		"Note: no text was provided with the image, so the search used the generic query \
		 \"{fallback_query}\"."
	)
}

/// Suffix recording why the completion collaborator was bypassed.
pub fn fallback_suffix(reason: &str) -> String {
	format!("{FALLBACK_MARKER} ({reason})")
}

fn fallback_instruction(fallback_query: &str) -> String {
	format!(
		"The user sent only an image, so the documents were searched with the generic query \
		 \"{fallback_query}\". Mention this to the user."
	)
}

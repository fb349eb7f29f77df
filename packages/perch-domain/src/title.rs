pub const MAX_TITLE_CHARS: usize = 60;
pub const UNTITLED: &str = "Untitled";

/// Display title for a conversation: the stored title, else the first user message text cut to
/// [`MAX_TITLE_CHARS`] characters, else [`UNTITLED`].
pub fn derive(stored: Option<&str>, first_user_text: Option<&str>) -> String {
	if let Some(title) = stored {
		return title.to_string();
	}

	first_user_text
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(|text| text.chars().take(MAX_TITLE_CHARS).collect())
		.unwrap_or_else(|| UNTITLED.to_string())
}

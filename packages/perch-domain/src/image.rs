use std::path::Path;

pub const MAX_IMAGE_BYTES: usize = 5 * 1_024 * 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
	NotAnImage,
	TooLarge,
}
impl RejectCode {
	pub fn message(self) -> &'static str {
		match self {
			Self::NotAnImage => "Invalid file type. Please upload an image.",
			Self::TooLarge => "File too large. Maximum size is 5MB.",
		}
	}
}

/// Checks the declared content type and size. The bytes themselves are not sniffed.
pub fn validate(content_type: Option<&str>, size: usize) -> Result<(), RejectCode> {
	let is_image = content_type
		.map(|value| value.trim().to_ascii_lowercase())
		.map(|value| value.starts_with("image/"))
		.unwrap_or(false);

	if !is_image {
		return Err(RejectCode::NotAnImage);
	}
	if size > MAX_IMAGE_BYTES {
		return Err(RejectCode::TooLarge);
	}

	Ok(())
}

/// Extension for the stored blob, always starting with a dot.
pub fn storage_extension(original_name: Option<&str>, content_type: Option<&str>) -> String {
	let from_name = original_name
		.map(display_name)
		.and_then(|name| {
			Path::new(&name).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
		})
		.filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

	if let Some(ext) = from_name {
		return format!(".{ext}");
	}

	let ext = match content_type.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
		Some("image/jpeg") => ".jpg",
		Some("image/png") => ".png",
		Some("image/gif") => ".gif",
		Some("image/webp") => ".webp",
		_ => ".img",
	};

	ext.to_string()
}

/// Final path component of a client-supplied filename, for display only.
pub fn display_name(original_name: &str) -> String {
	original_name.rsplit(['/', '\\']).next().unwrap_or_default().trim().to_string()
}

pub fn is_safe_filename(filename: &str) -> bool {
	let mut chars = filename.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	first.is_ascii_alphanumeric()
		&& chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
		&& !filename.contains("..")
}

pub fn content_type_for(filename: &str) -> &'static str {
	let ext = Path::new(filename)
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	match ext.as_str() {
		"png" => "image/png",
		"jpg" | "jpeg" => "image/jpeg",
		"gif" => "image/gif",
		"webp" => "image/webp",
		_ => "application/octet-stream",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_name_strips_directories() {
		assert_eq!(display_name("../../etc/passwd"), "passwd");
		assert_eq!(display_name("C:\\Users\\me\\finch.png"), "finch.png");
	}

	#[test]
	fn extension_falls_back_to_content_type() {
		assert_eq!(storage_extension(Some("photo"), Some("image/png")), ".png");
		assert_eq!(storage_extension(None, Some("image/x-unknown")), ".img");
		assert_eq!(storage_extension(Some("Photo.JPEG"), Some("image/png")), ".jpeg");
	}
}

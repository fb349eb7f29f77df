use uuid::Uuid;

use perch_domain::image;

use crate::{Error, PerchService, Result};

/// Fallback display name for uploads sent without a filename.
pub const DEFAULT_IMAGE_NAME: &str = "image";

#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
	pub bytes: Vec<u8>,
	pub content_type: Option<String>,
	pub file_name: Option<String>,
}
impl ImageUpload {
	/// Rejects uploads outside the image family or above the size limit.
	pub fn validate(&self) -> Result<()> {
		image::validate(self.content_type.as_deref(), self.bytes.len())
			.map_err(|code| Error::validation(code.message()))
	}

	pub fn display_name(&self) -> String {
		self.file_name
			.as_deref()
			.map(image::display_name)
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
	pub bytes: Vec<u8>,
	pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedImage {
	/// Opaque blob locator persisted on the message.
	pub reference: String,
	/// Client filename, kept for display only.
	pub name: String,
}

impl PerchService {
	/// Validates and stores an image under a generated name.
	pub async fn ingest_image(&self, upload: &ImageUpload) -> Result<IngestedImage> {
		upload.validate()?;

		let extension =
			image::storage_extension(upload.file_name.as_deref(), upload.content_type.as_deref());
		let stored_name = format!("{}{extension}", Uuid::new_v4());
		let reference = self.blobs.write(&stored_name, &upload.bytes).await?;
		Ok(IngestedImage { reference, name: upload.display_name() })
	}

	/// Loads a stored image by its generated name for serving.
	pub async fn read_image(&self, filename: &str) -> Result<StoredImage> {
		if !image::is_safe_filename(filename) {
			return Err(Error::validation("Invalid filename."));
		}

		let Some(bytes) = self.blobs.read(filename).await? else {
			return Err(Error::NotFound { message: format!("Upload {filename} does not exist.") });
		};

		Ok(StoredImage { bytes, content_type: image::content_type_for(filename) })
	}
}

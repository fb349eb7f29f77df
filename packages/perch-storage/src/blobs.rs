use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use tokio::{fs, io::AsyncWriteExt};

use crate::{Error, Result};

/// Prefix of every blob reference handed out by [`BlobStore::write`].
pub const REF_PREFIX: &str = "uploads/";

/// Write-once file store. Blobs are addressed by a generated name and never overwritten.
#[derive(Debug, Clone)]
pub struct BlobStore {
	root: PathBuf,
}
impl BlobStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Stores `bytes` under `name` and returns the opaque reference to persist.
	pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<String> {
		let path = self.resolve(name)?;
		fs::create_dir_all(&self.root).await?;
		let opened = fs::OpenOptions::new().write(true).create_new(true).open(&path).await;
		let mut file = match opened {
			Ok(file) => file,
			Err(err) if err.kind() == ErrorKind::AlreadyExists =>
				return Err(Error::Conflict(format!("Blob {name} already exists."))),
			Err(err) => return Err(err.into()),
		};

		file.write_all(bytes).await?;
		file.flush().await?;
		tracing::debug!(name, bytes = bytes.len(), "Stored blob.");
		Ok(format!("{REF_PREFIX}{name}"))
	}

	/// Returns `None` when no blob with that name exists.
	pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
		let path = self.resolve(name)?;

		match fs::read(&path).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	fn resolve(&self, name: &str) -> Result<PathBuf> {
		let is_plain = !name.is_empty()
			&& name != "."
			&& name != ".."
			&& Path::new(name).file_name().and_then(|value| value.to_str()) == Some(name);

		if !is_plain {
			return Err(Error::InvalidArgument(format!(
				"Blob name {name:?} is not a plain file name."
			)));
		}

		Ok(self.root.join(name))
	}
}

/// Blob name carried by a reference, i.e. its last path component.
pub fn name_from_ref(reference: &str) -> &str {
	reference.rsplit('/').next().unwrap_or(reference)
}

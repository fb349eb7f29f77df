pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	Validation { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Persistence error: {message}")]
	Persistence { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}
}

impl From<perch_storage::Error> for Error {
	fn from(err: perch_storage::Error) -> Self {
		match err {
			perch_storage::Error::InvalidArgument(message) => Self::Validation { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

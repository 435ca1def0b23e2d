use askql_domain::TransitionError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid transition: {message}")]
	InvalidTransition { message: String },
	#[error("Generation failed: {message}")]
	Generation { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
}
impl Error {
	pub(crate) fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
		Self::NotFound { message: format!("{what} {id} does not exist.") }
	}

	pub(crate) fn index(err: askql_storage::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
impl From<askql_storage::Error> for Error {
	fn from(err: askql_storage::Error) -> Self {
		match err {
			askql_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			askql_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			askql_storage::Error::NotFound(message) => Self::NotFound { message },
			askql_storage::Error::Conflict(message) => Self::InvalidTransition { message },
			askql_storage::Error::Qdrant(inner) => Self::Index { message: inner.to_string() },
		}
	}
}
impl From<TransitionError> for Error {
	fn from(err: TransitionError) -> Self {
		Self::InvalidTransition { message: err.to_string() }
	}
}
impl From<askql_providers::Error> for Error {
	fn from(err: askql_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

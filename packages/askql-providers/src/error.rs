pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Provider returned HTTP {status}: {body}")]
	Status { status: u16, body: String },
}
impl Error {
	/// Connect failures, rate limiting and server errors are worth one more attempt.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Reqwest(err) => !err.is_timeout() && err.is_connect(),
			Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
			_ => false,
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Reqwest(err) if err.is_timeout())
	}
}

pub mod completion;
pub mod embedding;
pub mod error;
pub mod fallback;

pub use error::{Error, Result};

use reqwest::{
	Response,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {api_key}"))?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(raw)?);
	}

	Ok(headers)
}

/// Decodes a JSON body, turning non-success statuses into [`Error::Status`].
pub(crate) async fn read_json(res: Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	Ok(res.json().await?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_bearer_and_default_headers() {
		let mut defaults = Map::new();

		defaults.insert("x-team".to_string(), Value::String("data".to_string()));

		let headers = auth_headers("sk-test", &defaults).expect("headers");

		assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
		assert_eq!(headers["x-team"], "data");
	}

	#[test]
	fn rejects_non_string_default_header() {
		let mut defaults = Map::new();

		defaults.insert("x-retries".to_string(), Value::from(3));

		assert!(matches!(auth_headers("sk-test", &defaults), Err(Error::InvalidConfig { .. })));
	}

	#[test]
	fn rate_limits_and_server_errors_are_transient() {
		let status = |status| Error::Status { status, body: String::new() };

		assert!(status(429).is_transient());
		assert!(status(503).is_transient());
		assert!(!status(400).is_transient());
		assert!(!Error::InvalidResponse { message: "empty".to_string() }.is_transient());
	}
}

use std::{sync::Arc, time::Duration};

use askql_config::LlmProviderConfig;
use askql_domain::extract_sql;

use crate::{CompletionProvider, Error, Result, prompt::GenerationRequest};

const MAX_ATTEMPTS: u32 = 2;

pub struct SqlGenerator {
	completion: Arc<dyn CompletionProvider>,
	cfg: LlmProviderConfig,
}
impl SqlGenerator {
	pub fn new(completion: Arc<dyn CompletionProvider>, cfg: LlmProviderConfig) -> Self {
		Self { completion, cfg }
	}

	/// Completes the request and returns only the extracted SQL.
	///
	/// A transient transport failure is retried once. Timeouts are not retried.
	pub async fn generate(&self, request: &GenerationRequest) -> Result<String> {
		let messages = request.to_values();
		let timeout = Duration::from_millis(self.cfg.timeout_ms);
		let mut attempt = 1;

		let text = loop {
			let result =
				tokio::time::timeout(timeout, self.completion.complete(&self.cfg, &messages)).await;

			match result {
				Ok(Ok(text)) => break text,
				Ok(Err(err)) if err.is_transient() && attempt < MAX_ATTEMPTS => {
					tracing::warn!(
						error = %err,
						attempt,
						provider_id = %self.cfg.provider_id,
						"Retrying completion after transient failure."
					);

					attempt += 1;
				},
				Ok(Err(err)) => {
					tracing::warn!(error = %err, attempt, "Completion failed.");

					return Err(Error::Generation { message: err.to_string() });
				},
				Err(_) => {
					tracing::warn!(
						timeout_ms = self.cfg.timeout_ms,
						attempt,
						"Completion timed out."
					);

					return Err(Error::Generation {
						message: format!("Completion timed out after {} ms.", self.cfg.timeout_ms),
					});
				},
			}
		};

		extract_sql(&text).ok_or_else(|| {
			tracing::warn!(response_len = text.len(), "Completion contained no SQL.");

			Error::Generation { message: "Completion contained no SQL.".to_string() }
		})
	}
}

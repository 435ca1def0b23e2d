mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DEFAULT_REGENERATION_SYSTEM_PROMPT, DEFAULT_SYSTEM_PROMPT, EmbeddingProviderConfig,
	Generation, LlmProviderConfig, Postgres, Providers, Qdrant, Retrieval, Security, Service,
	Storage, Vector, VectorBackend,
};

use std::{fs, net::SocketAddr, path::Path};

/// Retrieval limits above this are almost certainly a misconfiguration; the prompt would not fit.
pub const MAX_RETRIEVAL_K: u32 = 100;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in
		[("service.http_bind", &cfg.service.http_bind), ("service.admin_bind", &cfg.service.admin_bind)]
	{
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	let admin_addr: SocketAddr = cfg.service.admin_bind.parse().map_err(|_| Error::Validation {
		message: "service.admin_bind must be a socket address.".to_string(),
	})?;

	if !admin_addr.ip().is_loopback() {
		return Err(Error::Validation {
			message: "service.admin_bind must be a loopback address.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection_prefix.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection_prefix must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 || cfg.providers.completion.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "Provider timeout_ms must be greater than zero.".to_string(),
		});
	}

	let temperature = cfg.providers.completion.temperature;

	if !temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.completion.temperature must be a finite number.".to_string(),
		});
	}
	if temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.completion.temperature must be zero or greater.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("completion", &cfg.providers.completion.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, k) in [
		("retrieval.ddl_k", cfg.retrieval.ddl_k),
		("retrieval.documentation_k", cfg.retrieval.documentation_k),
		("retrieval.examples_k", cfg.retrieval.examples_k),
	] {
		if k > MAX_RETRIEVAL_K {
			return Err(Error::Validation {
				message: format!("{label} must be {MAX_RETRIEVAL_K} or less."),
			});
		}
	}

	if cfg.generation.system_prompt.trim().is_empty() {
		return Err(Error::Validation {
			message: "generation.system_prompt must be non-empty.".to_string(),
		});
	}
	if cfg.generation.regeneration_system_prompt.trim().is_empty() {
		return Err(Error::Validation {
			message: "generation.regeneration_system_prompt must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	if cfg.service.log_level.is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	let api_base = cfg.providers.embedding.api_base.trim_end_matches('/').to_string();

	cfg.providers.embedding.api_base = api_base;

	let api_base = cfg.providers.completion.api_base.trim_end_matches('/').to_string();

	cfg.providers.completion.api_base = api_base;
}

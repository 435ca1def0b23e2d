use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate accurate SQL queries based on natural language inputs and the provided database schema and context. Return only the SQL query without any explanations or markdown formatting.";
pub const DEFAULT_REGENERATION_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate a corrected SQL query, avoiding the mistakes in previous attempts. Return only the SQL query without any explanations or markdown formatting.";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub generation: Generation,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vector: Vector,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vector {
	pub backend: VectorBackend,
}

/// Where embedding records live. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
	Qdrant,
	Postgres,
	Memory,
}
impl VectorBackend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Qdrant => "qdrant",
			Self::Postgres => "postgres",
			Self::Memory => "memory",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Collections are named `<collection_prefix>_<kind>`.
	pub collection_prefix: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub completion: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub ddl_k: u32,
	pub documentation_k: u32,
	pub examples_k: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { ddl_k: 10, documentation_k: 10, examples_k: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Generation {
	pub system_prompt: String,
	pub regeneration_system_prompt: String,
}
impl Default for Generation {
	fn default() -> Self {
		Self {
			system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
			regeneration_system_prompt: DEFAULT_REGENERATION_SYSTEM_PROMPT.to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}

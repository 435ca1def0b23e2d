pub mod admin;
pub mod chat;
pub mod curator;
pub mod embedding_store;
pub mod generator;
pub mod knowledge;
pub mod prompt;
pub mod retriever;
pub mod time_serde;

mod error;

pub use admin::ReindexReport;
pub use askql_storage::BoxFuture;
pub use chat::{
	ChatView, FeedbackResponse, SubmitFeedbackRequest, SubmitQuestionRequest, TurnView,
};
pub use curator::{PromoteRequest, PromoteResponse};
pub use embedding_store::{EmbeddingStore, QueryVectors, UpsertOutcome};
pub use error::{Error, Result};
pub use generator::SqlGenerator;
pub use knowledge::{AddItemRequest, AddItemResponse, ItemView, ProjectView};
pub use prompt::{ChatMessage, GenerationRequest, PromptAssembler};
pub use retriever::{ContextBundle, RetrievalLimits, RetrievedItem};

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use serde_json::Value;
use uuid::Uuid;

use askql_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use askql_providers::{completion, embedding};
use askql_storage::{Repository, VectorIndex};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, askql_providers::Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, askql_providers::Result<String>>;
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, askql_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, askql_providers::Result<String>> {
		Box::pin(completion::complete(cfg, messages))
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { embedding, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), completion: provider }
	}
}

pub struct AskqlService {
	pub cfg: Config,
	pub repo: Arc<dyn Repository>,
	pub store: EmbeddingStore,
	pub generator: SqlGenerator,
	pub prompts: PromptAssembler,
	chat_locks: ChatLocks,
}
impl AskqlService {
	pub fn new(cfg: Config, repo: Arc<dyn Repository>, index: Arc<dyn VectorIndex>) -> Self {
		Self::with_providers(cfg, repo, index, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		repo: Arc<dyn Repository>,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		let store =
			EmbeddingStore::new(index, providers.embedding, cfg.providers.embedding.clone());
		let generator = SqlGenerator::new(providers.completion, cfg.providers.completion.clone());
		let prompts = PromptAssembler::new(&cfg.generation);

		Self { cfg, repo, store, generator, prompts, chat_locks: ChatLocks::default() }
	}

	pub fn default_limits(&self) -> RetrievalLimits {
		RetrievalLimits::from(&self.cfg.retrieval)
	}
}

/// One async mutex per chat so turns of a chat are appended and rated one at a time.
#[derive(Default)]
struct ChatLocks {
	locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}
impl ChatLocks {
	fn get(&self, chat_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
		let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

		locks.retain(|_, lock| Arc::strong_count(lock) > 1);

		locks.entry(chat_id).or_default().clone()
	}
}

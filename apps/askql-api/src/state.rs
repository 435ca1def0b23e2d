use std::sync::Arc;

use askql_config::{Config, VectorBackend};
use askql_service::AskqlService;
use askql_storage::{
	Repository, VectorIndex,
	db::Db,
	memory::{MemoryIndex, MemoryRepository},
	pg::PgRepository,
	pgvector::PgVectorIndex,
	qdrant::QdrantIndex,
};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AskqlService>,
}
impl AppState {
	/// Wires storage for the configured vector backend.
	///
	/// `memory` keeps projects, chats and embeddings in process and needs no Postgres.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let (repo, index): (Arc<dyn Repository>, Arc<dyn VectorIndex>) =
			match config.storage.vector.backend {
				VectorBackend::Memory => {
					let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
					let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

					(repo, index)
				},
				backend => {
					let db = Db::connect(&config.storage.postgres).await?;

					db.ensure_schema(config.storage.qdrant.vector_dim).await?;

					let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(db.pool.clone()));
					let index: Arc<dyn VectorIndex> = if backend == VectorBackend::Qdrant {
						let qdrant = QdrantIndex::new(&config.storage.qdrant)?;

						qdrant.ensure_collections().await?;

						Arc::new(qdrant)
					} else {
						Arc::new(PgVectorIndex::new(db.pool))
					};

					(repo, index)
				},
			};

		tracing::info!(vector_backend = index.backend(), "Storage ready.");

		Ok(Self::from_service(AskqlService::new(config, repo, index)))
	}

	pub fn from_service(service: AskqlService) -> Self {
		Self { service: Arc::new(service) }
	}
}

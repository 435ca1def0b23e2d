//! Embeds knowledge items and answers nearest-neighbour queries per project and kind.
//!
//! When the embedding service fails, text is embedded with the local hashed fallback and the
//! record is flagged degraded. Queries embed with both the primary service and the fallback and
//! merge the hits of both versions, so degraded items stay retrievable.

use std::{collections::HashSet, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use askql_config::EmbeddingProviderConfig;
use askql_domain::Kind;
use askql_providers::{embedding, fallback};
use askql_storage::{IndexHit, IndexQuery, IndexRecord, VectorIndex, index};

use crate::{EmbeddingProvider, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
	pub embedding_version: String,
	pub degraded: bool,
}

/// A question embedded once and reused for every kind.
#[derive(Debug, Clone)]
pub struct QueryVectors {
	/// `None` when the embedding service was unavailable.
	pub primary: Option<Vec<f32>>,
	pub fallback: Vec<f32>,
}

pub struct EmbeddingStore {
	index: Arc<dyn VectorIndex>,
	embedder: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	primary_version: String,
	fallback_version: String,
}
impl EmbeddingStore {
	pub fn new(
		index: Arc<dyn VectorIndex>,
		embedder: Arc<dyn EmbeddingProvider>,
		cfg: EmbeddingProviderConfig,
	) -> Self {
		let primary_version = embedding::embedding_version(&cfg);
		let fallback_version = fallback::fallback_version(cfg.dimensions);

		Self { index, embedder, cfg, primary_version, fallback_version }
	}

	pub fn backend(&self) -> &'static str {
		self.index.backend()
	}

	pub fn primary_version(&self) -> &str {
		&self.primary_version
	}

	pub fn fallback_version(&self) -> &str {
		&self.fallback_version
	}

	/// Embeds `text` and writes the record, replacing any previous record for the item.
	pub async fn upsert(
		&self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
		text: &str,
		created_at: OffsetDateTime,
	) -> Result<UpsertOutcome> {
		let (vector, embedding_version, degraded) = match self.embed_primary(text).await {
			Ok(vector) => (vector, self.primary_version.clone(), false),
			Err(err) => {
				tracing::warn!(
					embedding_degraded = true,
					error = %err,
					provider_id = %self.cfg.provider_id,
					project_id = %project_id,
					kind = kind.as_str(),
					item_id = %item_id,
					"Indexing item with fallback embedding."
				);

				(
					fallback::hashed_embedding(text, self.cfg.dimensions),
					self.fallback_version.clone(),
					true,
				)
			},
		};
		let record = IndexRecord {
			project_id,
			kind,
			item_id,
			embedding_version: embedding_version.clone(),
			degraded,
			vector,
			created_at,
		};

		self.index.upsert(&record).await.map_err(Error::index)?;

		Ok(UpsertOutcome { embedding_version, degraded })
	}

	pub async fn delete(&self, project_id: Uuid, kind: Kind, item_id: Uuid) -> Result<()> {
		self.index.delete(project_id, kind, item_id).await.map_err(Error::index)
	}

	pub async fn delete_project(&self, project_id: Uuid) -> Result<()> {
		self.index.delete_project(project_id).await.map_err(Error::index)
	}

	pub async fn embed_query(&self, text: &str) -> QueryVectors {
		let primary = match self.embed_primary(text).await {
			Ok(vector) => Some(vector),
			Err(err) => {
				tracing::warn!(
					embedding_degraded = true,
					error = %err,
					provider_id = %self.cfg.provider_id,
					"Querying with fallback embedding only."
				);

				None
			},
		};

		QueryVectors { primary, fallback: fallback::hashed_embedding(text, self.cfg.dimensions) }
	}

	/// Up to `k` hits of one kind within one project, nearest first.
	pub async fn query_with(
		&self,
		vectors: &QueryVectors,
		project_id: Uuid,
		kind: Kind,
		k: u32,
	) -> Result<Vec<IndexHit>> {
		if k == 0 {
			return Ok(Vec::new());
		}

		let mut hits = self
			.index
			.query(IndexQuery {
				project_id,
				kind,
				embedding_version: &self.fallback_version,
				vector: &vectors.fallback,
				k,
			})
			.await
			.map_err(Error::index)?;

		if let Some(primary) = vectors.primary.as_deref() {
			let primary_hits = self
				.index
				.query(IndexQuery {
					project_id,
					kind,
					embedding_version: &self.primary_version,
					vector: primary,
					k,
				})
				.await
				.map_err(Error::index)?;

			hits.extend(primary_hits);
		}

		let mut seen = HashSet::new();

		index::sort_hits(&mut hits);
		hits.retain(|hit| seen.insert(hit.item_id));
		hits.truncate(k as usize);

		Ok(hits)
	}

	pub async fn query(
		&self,
		project_id: Uuid,
		kind: Kind,
		text: &str,
		k: u32,
	) -> Result<Vec<IndexHit>> {
		if k == 0 {
			return Ok(Vec::new());
		}

		let vectors = self.embed_query(text).await;

		self.query_with(&vectors, project_id, kind, k).await
	}

	async fn embed_primary(&self, text: &str) -> askql_providers::Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.embedder.embed(&self.cfg, &texts).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(askql_providers::Error::InvalidResponse {
				message: "Embedding response contained no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.dimensions as usize {
			return Err(askql_providers::Error::InvalidResponse {
				message: format!(
					"Embedding dimension mismatch; expected {}, got {}.",
					self.cfg.dimensions,
					vector.len()
				),
			});
		}

		Ok(vector)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use askql_storage::memory::MemoryIndex;

	use super::*;
	use crate::BoxFuture;

	const DIM: u32 = 8;

	/// Answers with vectors one element short of the configured dimension.
	struct TruncatingEmbedder;
	impl EmbeddingProvider for TruncatingEmbedder {
		fn embed<'a>(
			&'a self,
			cfg: &'a EmbeddingProviderConfig,
			texts: &'a [String],
		) -> BoxFuture<'a, askql_providers::Result<Vec<Vec<f32>>>> {
			let vectors = texts.iter().map(|_| vec![0.5; cfg.dimensions as usize - 1]).collect();

			Box::pin(async move { Ok(vectors) })
		}
	}

	fn cfg() -> EmbeddingProviderConfig {
		EmbeddingProviderConfig {
			provider_id: "stub".to_string(),
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "test-key".to_string(),
			path: "/embeddings".to_string(),
			model: "stub-embedding".to_string(),
			dimensions: DIM,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		}
	}

	#[tokio::test]
	async fn wrong_dimension_degrades_to_fallback() {
		let store =
			EmbeddingStore::new(Arc::new(MemoryIndex::new()), Arc::new(TruncatingEmbedder), cfg());
		let project_id = Uuid::new_v4();
		let item_id = Uuid::new_v4();
		let outcome = store
			.upsert(project_id, Kind::Ddl, item_id, "CREATE TABLE t(id INT)", OffsetDateTime::now_utc())
			.await
			.expect("upsert");

		assert!(outcome.degraded);
		assert_eq!(outcome.embedding_version, store.fallback_version());

		let err = store.embed_primary("CREATE TABLE t(id INT)").await.expect_err("mismatch");

		assert!(err.to_string().contains("expected 8, got 7"));

		let vectors = store.embed_query("CREATE TABLE t(id INT)").await;
		let hits = store.query_with(&vectors, project_id, Kind::Ddl, 5).await.expect("query");

		assert!(vectors.primary.is_none());
		assert_eq!(hits.iter().map(|hit| hit.item_id).collect::<Vec<_>>(), vec![item_id]);
	}
}

use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
		PointStruct, PointsIdsList, Query, QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder,
		Value, VectorParamsBuilder, point_id::PointIdOptions, value::Kind as ValueKind,
	},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use askql_domain::Kind;

use crate::{
	BoxFuture, Error, Result,
	index::{self, IndexHit, IndexQuery, IndexRecord, VectorIndex},
};

/// One collection per knowledge kind, named `<collection_prefix>_<kind>`.
pub struct QdrantIndex {
	pub client: Qdrant,
	pub collection_prefix: String,
	pub vector_dim: u32,
}
impl QdrantIndex {
	pub fn new(cfg: &askql_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection_prefix: cfg.collection_prefix.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection(&self, kind: Kind) -> String {
		format!("{}_{}", self.collection_prefix, kind.as_str())
	}

	/// Creates missing collections with cosine distance.
	pub async fn ensure_collections(&self) -> Result<()> {
		for kind in Kind::ALL {
			let collection = self.collection(kind);

			if self.client.collection_exists(collection.clone()).await? {
				continue;
			}

			self.client
				.create_collection(CreateCollectionBuilder::new(collection.clone()).vectors_config(
					VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
				))
				.await?;

			tracing::info!(collection = %collection, "Qdrant collection created.");
		}

		Ok(())
	}

	async fn upsert_inner(&self, record: &IndexRecord) -> Result<()> {
		let created_at = record
			.created_at
			.format(&Rfc3339)
			.map_err(|err| Error::InvalidArgument(format!("created_at: {err}")))?;
		let mut payload_map = HashMap::new();

		payload_map.insert("project_id".to_string(), Value::from(record.project_id.to_string()));
		payload_map.insert("item_id".to_string(), Value::from(record.item_id.to_string()));
		payload_map.insert("kind".to_string(), Value::from(record.kind.as_str().to_string()));
		payload_map
			.insert("embedding_version".to_string(), Value::from(record.embedding_version.clone()));
		payload_map.insert("degraded".to_string(), Value::from(record.degraded));
		payload_map.insert("created_at".to_string(), Value::from(created_at));

		let point = PointStruct::new(
			record.item_id.to_string(),
			record.vector.clone(),
			Payload::from(payload_map),
		);
		let upsert = UpsertPointsBuilder::new(self.collection(record.kind), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	async fn query_inner(&self, query: IndexQuery<'_>) -> Result<Vec<IndexHit>> {
		if query.k == 0 {
			return Ok(Vec::new());
		}

		let filter = Filter::must([
			Condition::matches("project_id", query.project_id.to_string()),
			Condition::matches("embedding_version", query.embedding_version.to_string()),
		]);
		let search = QueryPointsBuilder::new(self.collection(query.kind))
			.query(Query::new_nearest(query.vector.to_vec()))
			.filter(filter)
			.with_payload(true)
			.limit(u64::from(query.k));
		let response = self.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in &response.result {
			match scored_point_to_hit(point) {
				Some(hit) => hits.push(hit),
				None => tracing::warn!(
					collection = %self.collection(query.kind),
					"Qdrant point is missing its item id or created_at payload."
				),
			}
		}

		index::sort_hits(&mut hits);

		Ok(hits)
	}
}
impl VectorIndex for QdrantIndex {
	fn backend(&self) -> &'static str {
		"qdrant"
	}

	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_inner(record))
	}

	fn delete<'a>(
		&'a self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let delete = DeletePointsBuilder::new(self.collection(kind))
				.points(PointsIdsList { ids: vec![PointId::from(item_id.to_string())] })
				.wait(true);

			self.client.delete_points(delete).await?;

			tracing::debug!(project_id = %project_id, item_id = %item_id, "Qdrant point deleted.");

			Ok(())
		})
	}

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			for kind in Kind::ALL {
				let filter =
					Filter::must([Condition::matches("project_id", project_id.to_string())]);
				let delete =
					DeletePointsBuilder::new(self.collection(kind)).points(filter).wait(true);

				self.client.delete_points(delete).await?;
			}

			Ok(())
		})
	}

	fn query<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(self.query_inner(query))
	}
}

fn scored_point_to_hit(point: &ScoredPoint) -> Option<IndexHit> {
	let item_id = point.id.as_ref().and_then(point_id_to_uuid)?;
	let created_at = payload_string(&point.payload, "created_at")
		.and_then(|raw| OffsetDateTime::parse(&raw, &Rfc3339).ok())?;

	// Qdrant reports cosine similarity.
	Some(IndexHit { item_id, distance: (1.0 - point.score).clamp(0.0, 2.0), created_at })
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(ValueKind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

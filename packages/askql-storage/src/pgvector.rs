use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::Kind;

use crate::{
	BoxFuture, Result,
	index::{IndexHit, IndexQuery, IndexRecord, VectorIndex},
};

/// Embedding records in the `item_embeddings` table, compared with pgvector's cosine operator.
pub struct PgVectorIndex {
	pool: PgPool,
}
impl PgVectorIndex {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl VectorIndex for PgVectorIndex {
	fn backend(&self) -> &'static str {
		"postgres"
	}

	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let vec_text = vector_to_pg(&record.vector);

			sqlx::query(
				"\
INSERT INTO item_embeddings (
	item_id,
	project_id,
	kind,
	embedding_version,
	degraded,
	embedding_dim,
	vec,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7::text::vector, $8)
ON CONFLICT (item_id) DO UPDATE
SET
	project_id = EXCLUDED.project_id,
	kind = EXCLUDED.kind,
	embedding_version = EXCLUDED.embedding_version,
	degraded = EXCLUDED.degraded,
	embedding_dim = EXCLUDED.embedding_dim,
	vec = EXCLUDED.vec,
	created_at = EXCLUDED.created_at",
			)
			.bind(record.item_id)
			.bind(record.project_id)
			.bind(record.kind.as_str())
			.bind(record.embedding_version.as_str())
			.bind(record.degraded)
			.bind(record.vector.len() as i32)
			.bind(vec_text.as_str())
			.bind(record.created_at)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn delete<'a>(
		&'a self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"DELETE FROM item_embeddings WHERE item_id = $1 AND project_id = $2 AND kind = $3",
			)
			.bind(item_id)
			.bind(project_id)
			.bind(kind.as_str())
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query("DELETE FROM item_embeddings WHERE project_id = $1")
				.bind(project_id)
				.execute(&self.pool)
				.await?;

			Ok(())
		})
	}

	fn query<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			let vec_text = vector_to_pg(query.vector);
			let rows: Vec<(Uuid, f32, OffsetDateTime)> = sqlx::query_as(
				"\
SELECT
	item_id,
	(vec <=> $1::text::vector)::real AS distance,
	created_at
FROM item_embeddings
WHERE project_id = $2 AND kind = $3 AND embedding_version = $4
ORDER BY distance ASC, created_at DESC, item_id ASC
LIMIT $5",
			)
			.bind(vec_text.as_str())
			.bind(query.project_id)
			.bind(query.kind.as_str())
			.bind(query.embedding_version)
			.bind(i64::from(query.k))
			.fetch_all(&self.pool)
			.await?;

			Ok(rows
				.into_iter()
				.map(|(item_id, distance, created_at)| IndexHit { item_id, distance, created_at })
				.collect())
		})
	}
}

fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

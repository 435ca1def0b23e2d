use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::Kind;

use crate::{BoxFuture, Result};

/// One embedding record, keyed by `(project_id, kind, item_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
	pub project_id: Uuid,
	pub kind: Kind,
	pub item_id: Uuid,
	pub embedding_version: String,
	pub degraded: bool,
	pub vector: Vec<f32>,
	/// Creation time of the item, used to break distance ties.
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexQuery<'a> {
	pub project_id: Uuid,
	pub kind: Kind,
	/// Only records produced by this embedding version are compared.
	pub embedding_version: &'a str,
	pub vector: &'a [f32],
	pub k: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
	pub item_id: Uuid,
	/// Cosine distance in `[0, 2]`.
	pub distance: f32,
	pub created_at: OffsetDateTime,
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn backend(&self) -> &'static str;

	/// Inserts or replaces the record. Readers see either the old or the new record.
	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, project_id: Uuid, kind: Kind, item_id: Uuid)
	-> BoxFuture<'a, Result<()>>;

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<()>>;

	/// Nearest records ordered by [`sort_hits`], at most `k`.
	fn query<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<IndexHit>>>;
}

/// Ascending distance, then newest first, then item id.
pub fn sort_hits(hits: &mut [IndexHit]) {
	hits.sort_by(compare_hits);
}

pub fn compare_hits(a: &IndexHit, b: &IndexHit) -> Ordering {
	a.distance
		.total_cmp(&b.distance)
		.then_with(|| b.created_at.cmp(&a.created_at))
		.then_with(|| a.item_id.cmp(&b.item_id))
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 1.0;
	}

	(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
	use time::Duration;

	use super::*;

	#[test]
	fn ties_prefer_newest_then_item_id() {
		let now = OffsetDateTime::now_utc();
		let older = now - Duration::minutes(5);
		let low_id = Uuid::from_u128(1);
		let high_id = Uuid::from_u128(2);
		let mut hits = vec![
			IndexHit { item_id: high_id, distance: 0.2, created_at: now },
			IndexHit { item_id: Uuid::from_u128(3), distance: 0.2, created_at: older },
			IndexHit { item_id: low_id, distance: 0.2, created_at: now },
			IndexHit { item_id: Uuid::from_u128(4), distance: 0.1, created_at: older },
		];

		sort_hits(&mut hits);

		let order = hits.iter().map(|hit| hit.item_id).collect::<Vec<_>>();

		assert_eq!(order, vec![Uuid::from_u128(4), low_id, high_id, Uuid::from_u128(3)]);
	}

	#[test]
	fn cosine_distance_bounds() {
		assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
		assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
		assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
	}
}

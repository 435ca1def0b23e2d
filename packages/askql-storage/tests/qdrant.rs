use time::OffsetDateTime;
use uuid::Uuid;

use askql_config::Qdrant;
use askql_domain::Kind;
use askql_storage::{IndexQuery, IndexRecord, VectorIndex, qdrant::QdrantIndex};
use askql_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ASKQL_PG_DSN and ASKQL_QDRANT_URL to run."]
async fn qdrant_index_filters_by_project_and_version() {
	let (Some(base_dsn), Some(qdrant_url)) = (askql_testkit::env_dsn(), askql_testkit::env_qdrant_url())
	else {
		eprintln!("Skipping qdrant_index_filters_by_project_and_version; set ASKQL_PG_DSN and ASKQL_QDRANT_URL.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Qdrant {
		url: qdrant_url,
		collection_prefix: test_db.collection_prefix("askql_index"),
		vector_dim: 3,
	};
	let index = QdrantIndex::new(&cfg).expect("Failed to build Qdrant client.");

	index.ensure_collections().await.expect("Failed to create collections.");
	index.ensure_collections().await.expect("Collection creation must be idempotent.");

	let project_id = Uuid::new_v4();
	let other_project = Uuid::new_v4();
	let item_id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();

	for (owner, id, version) in [
		(project_id, item_id, "test:v1:3"),
		(project_id, Uuid::new_v4(), "fallback:hashed-v1:3"),
		(other_project, Uuid::new_v4(), "test:v1:3"),
	] {
		let record = IndexRecord {
			project_id: owner,
			kind: Kind::Documentation,
			item_id: id,
			embedding_version: version.to_string(),
			degraded: version.starts_with("fallback"),
			vector: vec![1.0, 0.0, 0.0],
			created_at: now,
		};

		index.upsert(&record).await.expect("Failed to upsert.");
	}

	let hits = index
		.query(IndexQuery {
			project_id,
			kind: Kind::Documentation,
			embedding_version: "test:v1:3",
			vector: &[1.0, 0.0, 0.0],
			k: 10,
		})
		.await
		.expect("Failed to query.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].item_id, item_id);
	assert!(hits[0].distance < 1e-4);

	index.delete(project_id, Kind::Documentation, item_id).await.expect("Failed to delete.");

	let hits = index
		.query(IndexQuery {
			project_id,
			kind: Kind::Documentation,
			embedding_version: "test:v1:3",
			vector: &[1.0, 0.0, 0.0],
			k: 10,
		})
		.await
		.expect("Failed to query.");

	assert!(hits.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test resources.");
}

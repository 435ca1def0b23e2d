use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AskqlService, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReindexReport {
	pub project_id: Uuid,
	/// Version the primary embedding service writes.
	pub embedding_version: String,
	pub reindexed: u64,
	pub degraded: u64,
	pub failed: u64,
}

impl AskqlService {
	/// Re-embeds every persisted item of the project over its existing record.
	///
	/// Running it twice leaves the index in the same state.
	pub async fn reindex_project(&self, project_id: Uuid) -> Result<ReindexReport> {
		self.load_project(project_id).await?;

		let items = self.repo.list_items(project_id, None).await?;
		let mut report = ReindexReport {
			project_id,
			embedding_version: self.store.primary_version().to_string(),
			reindexed: 0,
			degraded: 0,
			failed: 0,
		};

		for item in items {
			let text = item.embedding_text();
			let upserted = self
				.store
				.upsert(project_id, item.kind(), item.item_id, &text, item.created_at)
				.await;

			match upserted {
				Ok(outcome) => {
					report.reindexed += 1;

					if outcome.degraded {
						report.degraded += 1;
					}
				},
				Err(err) => {
					tracing::warn!(error = %err, item_id = %item.item_id, "Failed to reindex item.");

					report.failed += 1;
				},
			}
		}

		tracing::info!(
			project_id = %project_id,
			backend = self.store.backend(),
			reindexed = report.reindexed,
			degraded = report.degraded,
			failed = report.failed,
			"Project reindexed."
		);

		Ok(report)
	}
}

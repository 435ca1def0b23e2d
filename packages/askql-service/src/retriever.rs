use std::collections::HashMap;

use uuid::Uuid;

use askql_domain::Kind;
use askql_storage::{IndexHit, models::KnowledgeItem};

use crate::{AskqlService, Error, Result};

/// Per-kind caps. Each kind is capped on its own; kinds never substitute for each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
	pub ddl: u32,
	pub documentation: u32,
	pub examples: u32,
}
impl RetrievalLimits {
	pub fn for_kind(&self, kind: Kind) -> u32 {
		match kind {
			Kind::Ddl => self.ddl,
			Kind::Documentation => self.documentation,
			Kind::Example => self.examples,
		}
	}

	fn is_empty(&self) -> bool {
		Kind::ALL.iter().all(|kind| self.for_kind(*kind) == 0)
	}
}
impl From<&askql_config::Retrieval> for RetrievalLimits {
	fn from(cfg: &askql_config::Retrieval) -> Self {
		Self { ddl: cfg.ddl_k, documentation: cfg.documentation_k, examples: cfg.examples_k }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedItem {
	pub item_id: Uuid,
	pub distance: f32,
	pub item: KnowledgeItem,
}

/// Ranked context for one question, nearest first within each list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
	pub ddl: Vec<RetrievedItem>,
	pub documentation: Vec<RetrievedItem>,
	pub examples: Vec<RetrievedItem>,
}
impl ContextBundle {
	pub fn get(&self, kind: Kind) -> &[RetrievedItem] {
		match kind {
			Kind::Ddl => &self.ddl,
			Kind::Documentation => &self.documentation,
			Kind::Example => &self.examples,
		}
	}

	fn slot(&mut self, kind: Kind) -> &mut Vec<RetrievedItem> {
		match kind {
			Kind::Ddl => &mut self.ddl,
			Kind::Documentation => &mut self.documentation,
			Kind::Example => &mut self.examples,
		}
	}
}

impl AskqlService {
	pub async fn retrieve(
		&self,
		project_id: Uuid,
		question: &str,
		limits: RetrievalLimits,
	) -> Result<ContextBundle> {
		if self.repo.get_project(project_id).await?.is_none() {
			return Err(Error::not_found("Project", project_id));
		}

		let mut bundle = ContextBundle::default();

		if limits.is_empty() {
			return Ok(bundle);
		}

		let vectors = self.store.embed_query(question).await;

		for kind in Kind::ALL {
			let hits =
				self.store.query_with(&vectors, project_id, kind, limits.for_kind(kind)).await?;

			*bundle.slot(kind) = self.hydrate(project_id, kind, hits).await?;
		}

		Ok(bundle)
	}

	async fn hydrate(
		&self,
		project_id: Uuid,
		kind: Kind,
		hits: Vec<IndexHit>,
	) -> Result<Vec<RetrievedItem>> {
		if hits.is_empty() {
			return Ok(Vec::new());
		}

		let ids = hits.iter().map(|hit| hit.item_id).collect::<Vec<_>>();
		let mut items = self
			.repo
			.get_items(&ids)
			.await?
			.into_iter()
			.map(|item| (item.item_id, item))
			.collect::<HashMap<_, _>>();
		let mut out = Vec::with_capacity(hits.len());

		for hit in hits {
			let Some(item) = items.remove(&hit.item_id) else {
				tracing::warn!(
					item_id = %hit.item_id,
					kind = kind.as_str(),
					"Dropping retrieval hit without a persisted item."
				);

				continue;
			};

			if item.project_id != project_id || item.kind() != kind {
				tracing::warn!(
					item_id = %hit.item_id,
					project_id = %project_id,
					kind = kind.as_str(),
					"Dropping retrieval hit outside the requested project or kind."
				);

				continue;
			}

			out.push(RetrievedItem { item_id: hit.item_id, distance: hit.distance, item });
		}

		Ok(out)
	}
}

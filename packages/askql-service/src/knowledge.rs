use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::Kind;
use askql_storage::models::{ItemContent, KnowledgeItem, Project};

use crate::{AskqlService, Error, Result, embedding_store::UpsertOutcome};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectView {
	pub project_id: Uuid,
	pub name: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Project> for ProjectView {
	fn from(project: Project) -> Self {
		Self { project_id: project.project_id, name: project.name, created_at: project.created_at }
	}
}

#[derive(Clone, Debug)]
pub struct AddItemRequest {
	pub project_id: Uuid,
	pub content: ItemContent,
	pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemView {
	pub item_id: Uuid,
	pub project_id: Uuid,
	pub kind: Kind,
	/// DDL text, documentation text, or the SQL of an example.
	pub content: String,
	pub question: Option<String>,
	pub metadata: Map<String, Value>,
	pub source_turn_id: Option<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<KnowledgeItem> for ItemView {
	fn from(item: KnowledgeItem) -> Self {
		let kind = item.kind();
		let (content, question) = match item.content {
			ItemContent::Ddl { ddl } => (ddl, None),
			ItemContent::Documentation { text } => (text, None),
			ItemContent::Example { question, sql } => (sql, Some(question)),
		};

		Self {
			item_id: item.item_id,
			project_id: item.project_id,
			kind,
			content,
			question,
			metadata: item.metadata,
			source_turn_id: item.source_turn_id,
			created_at: item.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddItemResponse {
	pub item: ItemView,
	pub embedding_version: String,
	pub degraded: bool,
}

impl AskqlService {
	pub async fn create_project(&self, name: &str) -> Result<ProjectView> {
		let name = name.trim();

		if name.is_empty() {
			return Err(Error::InvalidRequest { message: "name must be non-empty.".to_string() });
		}

		let project = Project {
			project_id: Uuid::new_v4(),
			name: name.to_string(),
			created_at: OffsetDateTime::now_utc(),
		};

		self.repo.create_project(&project).await?;

		tracing::info!(project_id = %project.project_id, "Project created.");

		Ok(ProjectView::from(project))
	}

	pub async fn get_project(&self, project_id: Uuid) -> Result<ProjectView> {
		self.load_project(project_id).await.map(ProjectView::from)
	}

	/// Removes the project with its items, chats, turns and every embedding record.
	pub async fn delete_project(&self, project_id: Uuid) -> Result<()> {
		self.load_project(project_id).await?;
		self.store.delete_project(project_id).await?;

		if !self.repo.delete_project(project_id).await? {
			return Err(Error::not_found("Project", project_id));
		}

		tracing::info!(project_id = %project_id, "Project deleted.");

		Ok(())
	}

	pub async fn add_ddl(
		&self,
		project_id: Uuid,
		ddl: &str,
		metadata: Map<String, Value>,
	) -> Result<AddItemResponse> {
		let content = ItemContent::Ddl { ddl: required("ddl", ddl)? };

		self.add_item(AddItemRequest { project_id, content, metadata }).await
	}

	pub async fn add_documentation(
		&self,
		project_id: Uuid,
		text: &str,
		metadata: Map<String, Value>,
	) -> Result<AddItemResponse> {
		let content = ItemContent::Documentation { text: required("documentation", text)? };

		self.add_item(AddItemRequest { project_id, content, metadata }).await
	}

	pub async fn add_example(
		&self,
		project_id: Uuid,
		question: &str,
		sql: &str,
		metadata: Map<String, Value>,
	) -> Result<AddItemResponse> {
		let content = ItemContent::Example {
			question: required("question", question)?,
			sql: required("sql", sql)?,
		};

		self.add_item(AddItemRequest { project_id, content, metadata }).await
	}

	pub async fn add_item(&self, req: AddItemRequest) -> Result<AddItemResponse> {
		validate_metadata(&req.metadata)?;
		self.load_project(req.project_id).await?;

		let item = KnowledgeItem {
			item_id: Uuid::new_v4(),
			project_id: req.project_id,
			content: req.content,
			metadata: req.metadata,
			source_turn_id: None,
			created_at: OffsetDateTime::now_utc(),
		};
		let Some(outcome) = self.insert_indexed(&item).await? else {
			return Err(Error::InvalidRequest { message: "Item was not stored.".to_string() });
		};

		Ok(AddItemResponse {
			item: ItemView::from(item),
			embedding_version: outcome.embedding_version,
			degraded: outcome.degraded,
		})
	}

	pub async fn list_items(&self, project_id: Uuid, kind: Option<Kind>) -> Result<Vec<ItemView>> {
		self.load_project(project_id).await?;

		let items = self.repo.list_items(project_id, kind).await?;

		Ok(items.into_iter().map(ItemView::from).collect())
	}

	pub async fn delete_item(&self, project_id: Uuid, kind: Kind, item_id: Uuid) -> Result<()> {
		if !self.repo.delete_item(project_id, kind, item_id).await? {
			return Err(Error::not_found("Item", item_id));
		}

		self.store.delete(project_id, kind, item_id).await
	}

	pub(crate) async fn load_project(&self, project_id: Uuid) -> Result<Project> {
		self.repo
			.get_project(project_id)
			.await?
			.ok_or_else(|| Error::not_found("Project", project_id))
	}

	/// Persists the item, then writes its embedding record.
	///
	/// Returns `None` when an example promoted from the same turn already exists. If the index
	/// write fails the row is removed again so persistence and index stay consistent.
	pub(crate) async fn insert_indexed(
		&self,
		item: &KnowledgeItem,
	) -> Result<Option<UpsertOutcome>> {
		if !self.repo.insert_item(item).await? {
			return Ok(None);
		}

		let text = item.embedding_text();
		let upserted = self
			.store
			.upsert(item.project_id, item.kind(), item.item_id, &text, item.created_at)
			.await;

		match upserted {
			Ok(outcome) => Ok(Some(outcome)),
			Err(err) => {
				tracing::warn!(
					error = %err,
					item_id = %item.item_id,
					kind = item.kind().as_str(),
					"Index write failed. Removing persisted item."
				);

				if let Err(cleanup) =
					self.repo.delete_item(item.project_id, item.kind(), item.item_id).await
				{
					tracing::warn!(error = %cleanup, item_id = %item.item_id, "Failed to remove item.");
				}

				Err(err)
			},
		}
	}
}

fn required(field: &str, value: &str) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidRequest { message: format!("{field} must be non-empty.") });
	}

	Ok(trimmed.to_string())
}

/// Metadata maps strings to scalars only.
pub(crate) fn validate_metadata(metadata: &Map<String, Value>) -> Result<()> {
	for (key, value) in metadata {
		if value.is_array() || value.is_object() {
			return Err(Error::InvalidRequest {
				message: format!("metadata.{key} must be a string, number, boolean or null."),
			});
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metadata_rejects_nested_values() {
		let mut metadata = Map::new();

		metadata.insert("owner".to_string(), Value::from("analytics"));
		metadata.insert("rows".to_string(), Value::from(12));

		assert!(validate_metadata(&metadata).is_ok());

		metadata.insert("tags".to_string(), serde_json::json!(["a", "b"]));

		assert!(matches!(validate_metadata(&metadata), Err(Error::InvalidRequest { .. })));
	}

	#[test]
	fn example_view_splits_question_and_sql() {
		let item = KnowledgeItem {
			item_id: Uuid::new_v4(),
			project_id: Uuid::new_v4(),
			content: ItemContent::Example {
				question: "how many users".to_string(),
				sql: "SELECT count(*) FROM users;".to_string(),
			},
			metadata: Map::new(),
			source_turn_id: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
		};
		let view = ItemView::from(item);

		assert_eq!(view.kind, Kind::Example);
		assert_eq!(view.content, "SELECT count(*) FROM users;");
		assert_eq!(view.question.as_deref(), Some("how many users"));
	}
}

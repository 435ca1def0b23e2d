use serde_json::{Map, Value};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::{Correctness, FeedbackState, Kind};

use crate::{
	BoxFuture, Error, Result,
	models::{Chat, ItemContent, KnowledgeItem, Project, QueryTurn},
	repository::Repository,
};

const ITEM_COLUMNS: &str =
	"item_id, project_id, kind, body, question, metadata, source_turn_id, created_at";
const TURN_COLUMNS: &str = "turn_id, chat_id, position, question, sql, correctness, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
	project_id: Uuid,
	name: String,
	created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
	item_id: Uuid,
	project_id: Uuid,
	kind: String,
	body: String,
	question: Option<String>,
	metadata: Value,
	source_turn_id: Option<Uuid>,
	created_at: OffsetDateTime,
}
impl TryFrom<ItemRow> for KnowledgeItem {
	type Error = Error;

	fn try_from(row: ItemRow) -> Result<Self> {
		let kind: Kind = row.kind.parse().map_err(|err| Error::InvalidArgument(format!("{err}")))?;
		let content = match kind {
			Kind::Ddl => ItemContent::Ddl { ddl: row.body },
			Kind::Documentation => ItemContent::Documentation { text: row.body },
			Kind::Example => ItemContent::Example {
				question: row.question.unwrap_or_default(),
				sql: row.body,
			},
		};
		let metadata = match row.metadata {
			Value::Object(map) => map,
			_ => Map::new(),
		};

		Ok(Self {
			item_id: row.item_id,
			project_id: row.project_id,
			content,
			metadata,
			source_turn_id: row.source_turn_id,
			created_at: row.created_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
	chat_id: Uuid,
	project_id: Uuid,
	feedback_state: String,
	created_at: OffsetDateTime,
}
impl TryFrom<ChatRow> for Chat {
	type Error = Error;

	fn try_from(row: ChatRow) -> Result<Self> {
		let feedback = row
			.feedback_state
			.parse::<FeedbackState>()
			.map_err(|err| Error::InvalidArgument(format!("{err}")))?;

		Ok(Self {
			chat_id: row.chat_id,
			project_id: row.project_id,
			feedback,
			created_at: row.created_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
struct TurnRow {
	turn_id: Uuid,
	chat_id: Uuid,
	position: i32,
	question: String,
	sql: Option<String>,
	correctness: String,
	created_at: OffsetDateTime,
}
impl TryFrom<TurnRow> for QueryTurn {
	type Error = Error;

	fn try_from(row: TurnRow) -> Result<Self> {
		let correctness = row
			.correctness
			.parse::<Correctness>()
			.map_err(|err| Error::InvalidArgument(format!("{err}")))?;

		Ok(Self {
			turn_id: row.turn_id,
			chat_id: row.chat_id,
			position: row.position,
			question: row.question,
			sql: row.sql,
			correctness,
			created_at: row.created_at,
		})
	}
}

pub struct PgRepository {
	pool: PgPool,
}
impl PgRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	async fn insert_item_inner(&self, item: &KnowledgeItem) -> Result<bool> {
		let (body, question) = match &item.content {
			ItemContent::Ddl { ddl } => (ddl.as_str(), None),
			ItemContent::Documentation { text } => (text.as_str(), None),
			ItemContent::Example { question, sql } => (sql.as_str(), Some(question.as_str())),
		};
		let result = sqlx::query(
			"\
INSERT INTO knowledge_items (
	item_id,
	project_id,
	kind,
	body,
	question,
	metadata,
	source_turn_id,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (project_id, source_turn_id) WHERE source_turn_id IS NOT NULL DO NOTHING",
		)
		.bind(item.item_id)
		.bind(item.project_id)
		.bind(item.kind().as_str())
		.bind(body)
		.bind(question)
		.bind(Value::Object(item.metadata.clone()))
		.bind(item.source_turn_id)
		.bind(item.created_at)
		.execute(&self.pool)
		.await
		.map_err(|err| missing_parent(err, "project", item.project_id))?;

		Ok(result.rows_affected() == 1)
	}

	async fn record_feedback_inner(
		&self,
		chat_id: Uuid,
		turn_id: Uuid,
		correctness: Correctness,
		from: FeedbackState,
		to: FeedbackState,
	) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		let calibrated = sqlx::query(
			"UPDATE chats SET feedback_state = $1 WHERE chat_id = $2 AND feedback_state = $3",
		)
		.bind(to.as_str())
		.bind(chat_id)
		.bind(from.as_str())
		.execute(&mut *tx)
		.await?;

		if calibrated.rows_affected() == 0 {
			let exists: Option<Uuid> =
				sqlx::query_scalar("SELECT chat_id FROM chats WHERE chat_id = $1")
					.bind(chat_id)
					.fetch_optional(&mut *tx)
					.await?;

			return Err(match exists {
				Some(_) => Error::Conflict(format!("chat {chat_id} is no longer {from}")),
				None => Error::NotFound(format!("chat {chat_id}")),
			});
		}

		let updated = sqlx::query(
			"\
UPDATE query_turns
SET correctness = $1
WHERE turn_id = $2 AND chat_id = $3 AND correctness = 'unset'",
		)
		.bind(correctness.as_str())
		.bind(turn_id)
		.bind(chat_id)
		.execute(&mut *tx)
		.await?;

		if updated.rows_affected() == 0 {
			let exists: Option<Uuid> = sqlx::query_scalar(
				"SELECT turn_id FROM query_turns WHERE turn_id = $1 AND chat_id = $2",
			)
			.bind(turn_id)
			.bind(chat_id)
			.fetch_optional(&mut *tx)
			.await?;

			return Err(match exists {
				Some(_) => Error::Conflict(format!("turn {turn_id} is already rated")),
				None => Error::NotFound(format!("turn {turn_id}")),
			});
		}

		tx.commit().await?;

		Ok(())
	}
}
impl Repository for PgRepository {
	fn create_project<'a>(&'a self, project: &'a Project) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query("INSERT INTO projects (project_id, name, created_at) VALUES ($1, $2, $3)")
				.bind(project.project_id)
				.bind(project.name.as_str())
				.bind(project.created_at)
				.execute(&self.pool)
				.await?;

			Ok(())
		})
	}

	fn get_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<Option<Project>>> {
		Box::pin(async move {
			let row: Option<ProjectRow> = sqlx::query_as(
				"SELECT project_id, name, created_at FROM projects WHERE project_id = $1",
			)
			.bind(project_id)
			.fetch_optional(&self.pool)
			.await?;

			Ok(row.map(|row| Project {
				project_id: row.project_id,
				name: row.name,
				created_at: row.created_at,
			}))
		})
	}

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM projects WHERE project_id = $1")
				.bind(project_id)
				.execute(&self.pool)
				.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn insert_item<'a>(&'a self, item: &'a KnowledgeItem) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.insert_item_inner(item))
	}

	fn get_items<'a>(&'a self, item_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>> {
		Box::pin(async move {
			if item_ids.is_empty() {
				return Ok(Vec::new());
			}

			let rows: Vec<ItemRow> = sqlx::query_as(&format!(
				"SELECT {ITEM_COLUMNS} FROM knowledge_items WHERE item_id = ANY($1)"
			))
			.bind(item_ids)
			.fetch_all(&self.pool)
			.await?;

			rows.into_iter().map(KnowledgeItem::try_from).collect()
		})
	}

	fn list_items<'a>(
		&'a self,
		project_id: Uuid,
		kind: Option<Kind>,
	) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>> {
		Box::pin(async move {
			let rows: Vec<ItemRow> = sqlx::query_as(&format!(
				"\
SELECT {ITEM_COLUMNS}
FROM knowledge_items
WHERE project_id = $1 AND ($2::text IS NULL OR kind = $2)
ORDER BY created_at ASC, item_id ASC"
			))
			.bind(project_id)
			.bind(kind.map(Kind::as_str))
			.fetch_all(&self.pool)
			.await?;

			rows.into_iter().map(KnowledgeItem::try_from).collect()
		})
	}

	fn delete_item<'a>(
		&'a self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let result = sqlx::query(
				"DELETE FROM knowledge_items WHERE item_id = $1 AND project_id = $2 AND kind = $3",
			)
			.bind(item_id)
			.bind(project_id)
			.bind(kind.as_str())
			.execute(&self.pool)
			.await?;

			Ok(result.rows_affected() > 0)
		})
	}

	fn find_example_by_source_turn<'a>(
		&'a self,
		project_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<KnowledgeItem>>> {
		Box::pin(async move {
			let row: Option<ItemRow> = sqlx::query_as(&format!(
				"\
SELECT {ITEM_COLUMNS}
FROM knowledge_items
WHERE project_id = $1 AND source_turn_id = $2 AND kind = 'example'"
			))
			.bind(project_id)
			.bind(turn_id)
			.fetch_optional(&self.pool)
			.await?;

			row.map(KnowledgeItem::try_from).transpose()
		})
	}

	fn create_chat<'a>(&'a self, chat: &'a Chat) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
INSERT INTO chats (chat_id, project_id, feedback_state, created_at)
VALUES ($1, $2, $3, $4)",
			)
			.bind(chat.chat_id)
			.bind(chat.project_id)
			.bind(chat.feedback.as_str())
			.bind(chat.created_at)
			.execute(&self.pool)
			.await
			.map_err(|err| missing_parent(err, "project", chat.project_id))?;

			Ok(())
		})
	}

	fn get_chat<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Option<Chat>>> {
		Box::pin(async move {
			let row: Option<ChatRow> = sqlx::query_as(
				"SELECT chat_id, project_id, feedback_state, created_at FROM chats WHERE chat_id = $1",
			)
			.bind(chat_id)
			.fetch_optional(&self.pool)
			.await?;

			row.map(Chat::try_from).transpose()
		})
	}

	fn insert_turn<'a>(&'a self, turn: &'a QueryTurn) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(&format!(
				"INSERT INTO query_turns ({TURN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
			))
			.bind(turn.turn_id)
			.bind(turn.chat_id)
			.bind(turn.position)
			.bind(turn.question.as_str())
			.bind(turn.sql.as_deref())
			.bind(turn.correctness.as_str())
			.bind(turn.created_at)
			.execute(&self.pool)
			.await
			.map_err(|err| match err {
				sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(format!(
					"chat {} already has a turn at position {}",
					turn.chat_id, turn.position
				)),
				other => missing_parent(other, "chat", turn.chat_id),
			})?;

			Ok(())
		})
	}

	fn set_turn_sql<'a>(&'a self, turn_id: Uuid, sql: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query("UPDATE query_turns SET sql = $1 WHERE turn_id = $2 AND sql IS NULL")
				.bind(sql)
				.bind(turn_id)
				.execute(&self.pool)
				.await?;

			Ok(())
		})
	}

	fn get_turn<'a>(
		&'a self,
		chat_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<QueryTurn>>> {
		Box::pin(async move {
			let row: Option<TurnRow> = sqlx::query_as(&format!(
				"SELECT {TURN_COLUMNS} FROM query_turns WHERE turn_id = $1 AND chat_id = $2"
			))
			.bind(turn_id)
			.bind(chat_id)
			.fetch_optional(&self.pool)
			.await?;

			row.map(QueryTurn::try_from).transpose()
		})
	}

	fn list_turns<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Vec<QueryTurn>>> {
		Box::pin(async move {
			let rows: Vec<TurnRow> = sqlx::query_as(&format!(
				"SELECT {TURN_COLUMNS} FROM query_turns WHERE chat_id = $1 ORDER BY position ASC"
			))
			.bind(chat_id)
			.fetch_all(&self.pool)
			.await?;

			rows.into_iter().map(QueryTurn::try_from).collect()
		})
	}

	fn record_feedback<'a>(
		&'a self,
		chat_id: Uuid,
		turn_id: Uuid,
		correctness: Correctness,
		from: FeedbackState,
		to: FeedbackState,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.record_feedback_inner(chat_id, turn_id, correctness, from, to))
	}
}

fn missing_parent(err: sqlx::Error, parent: &str, id: Uuid) -> Error {
	match err {
		sqlx::Error::Database(db) if db.is_foreign_key_violation() =>
			Error::NotFound(format!("{parent} {id}")),
		other => Error::Sqlx(other),
	}
}

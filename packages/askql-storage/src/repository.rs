use uuid::Uuid;

use askql_domain::{Correctness, FeedbackState, Kind};

use crate::{
	BoxFuture, Result,
	models::{Chat, KnowledgeItem, Project, QueryTurn},
};

/// Persistence for projects, knowledge items, chats and turns.
///
/// Deleting a project removes its items, chats and turns. Embedding records are owned by the
/// [`crate::VectorIndex`] and must be removed separately.
pub trait Repository
where
	Self: Send + Sync,
{
	fn create_project<'a>(&'a self, project: &'a Project) -> BoxFuture<'a, Result<()>>;

	fn get_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<Option<Project>>>;

	/// Returns `false` when the project did not exist.
	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<bool>>;

	/// Returns `false` without writing when an example promoted from the same turn already exists.
	fn insert_item<'a>(&'a self, item: &'a KnowledgeItem) -> BoxFuture<'a, Result<bool>>;

	/// Fetches items by id regardless of project. Unknown ids are skipped.
	fn get_items<'a>(&'a self, item_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>>;

	/// Items of a project, oldest first. `None` lists every kind.
	fn list_items<'a>(
		&'a self,
		project_id: Uuid,
		kind: Option<Kind>,
	) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>>;

	fn delete_item<'a>(
		&'a self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
	) -> BoxFuture<'a, Result<bool>>;

	fn find_example_by_source_turn<'a>(
		&'a self,
		project_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<KnowledgeItem>>>;

	fn create_chat<'a>(&'a self, chat: &'a Chat) -> BoxFuture<'a, Result<()>>;

	fn get_chat<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Option<Chat>>>;

	fn insert_turn<'a>(&'a self, turn: &'a QueryTurn) -> BoxFuture<'a, Result<()>>;

	/// Fills the generated SQL of a turn. SQL that is already set is never overwritten.
	fn set_turn_sql<'a>(&'a self, turn_id: Uuid, sql: &'a str) -> BoxFuture<'a, Result<()>>;

	fn get_turn<'a>(
		&'a self,
		chat_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<QueryTurn>>>;

	/// Turns of a chat ordered by position.
	fn list_turns<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Vec<QueryTurn>>>;

	/// Writes the turn verdict and moves the chat from `from` to `to` in one atomic step.
	///
	/// Fails with [`crate::Error::Conflict`] when the turn already carries a verdict or the chat
	/// is no longer in `from`. Nothing is written on failure.
	fn record_feedback<'a>(
		&'a self,
		chat_id: Uuid,
		turn_id: Uuid,
		correctness: Correctness,
		from: FeedbackState,
		to: FeedbackState,
	) -> BoxFuture<'a, Result<()>>;
}

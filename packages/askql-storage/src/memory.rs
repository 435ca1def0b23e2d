//! In-process adapters for both storage seams.
//!
//! Every operation takes one lock, so writes are atomic with respect to readers.

use std::{
	collections::HashMap,
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use uuid::Uuid;

use askql_domain::{Correctness, FeedbackState, Kind};

use crate::{
	BoxFuture, Error, Result,
	index::{self, IndexHit, IndexQuery, IndexRecord, VectorIndex},
	models::{Chat, ItemContent, KnowledgeItem, Project, QueryTurn},
	repository::Repository,
};

#[derive(Default)]
struct State {
	projects: HashMap<Uuid, Project>,
	items: HashMap<Uuid, KnowledgeItem>,
	chats: HashMap<Uuid, Chat>,
	turns: HashMap<Uuid, QueryTurn>,
}

#[derive(Default)]
pub struct MemoryRepository {
	state: RwLock<State>,
}
impl MemoryRepository {
	pub fn new() -> Self {
		Self::default()
	}

	fn read(&self) -> RwLockReadGuard<'_, State> {
		self.state.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, State> {
		self.state.write().unwrap_or_else(|err| err.into_inner())
	}
}
impl Repository for MemoryRepository {
	fn create_project<'a>(&'a self, project: &'a Project) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.write();

			if state.projects.contains_key(&project.project_id) {
				return Err(Error::Conflict(format!("project {} exists", project.project_id)));
			}

			state.projects.insert(project.project_id, project.clone());

			Ok(())
		})
	}

	fn get_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<Option<Project>>> {
		Box::pin(async move { Ok(self.read().projects.get(&project_id).cloned()) })
	}

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.write();

			if state.projects.remove(&project_id).is_none() {
				return Ok(false);
			}

			state.items.retain(|_, item| item.project_id != project_id);

			let chat_ids = state
				.chats
				.values()
				.filter(|chat| chat.project_id == project_id)
				.map(|chat| chat.chat_id)
				.collect::<Vec<_>>();

			for chat_id in &chat_ids {
				state.chats.remove(chat_id);
			}

			state.turns.retain(|_, turn| !chat_ids.contains(&turn.chat_id));

			Ok(true)
		})
	}

	fn insert_item<'a>(&'a self, item: &'a KnowledgeItem) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.write();

			if !state.projects.contains_key(&item.project_id) {
				return Err(Error::NotFound(format!("project {}", item.project_id)));
			}
			if let Some(source_turn_id) = item.source_turn_id
				&& state.items.values().any(|existing| {
					existing.project_id == item.project_id
						&& existing.source_turn_id == Some(source_turn_id)
				}) {
				return Ok(false);
			}

			state.items.insert(item.item_id, item.clone());

			Ok(true)
		})
	}

	fn get_items<'a>(&'a self, item_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>> {
		Box::pin(async move {
			let state = self.read();

			Ok(item_ids.iter().filter_map(|item_id| state.items.get(item_id).cloned()).collect())
		})
	}

	fn list_items<'a>(
		&'a self,
		project_id: Uuid,
		kind: Option<Kind>,
	) -> BoxFuture<'a, Result<Vec<KnowledgeItem>>> {
		Box::pin(async move {
			let state = self.read();
			let mut items = state
				.items
				.values()
				.filter(|item| item.project_id == project_id)
				.filter(|item| kind.is_none_or(|kind| item.kind() == kind))
				.cloned()
				.collect::<Vec<_>>();

			items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.item_id.cmp(&b.item_id)));

			Ok(items)
		})
	}

	fn delete_item<'a>(
		&'a self,
		project_id: Uuid,
		kind: Kind,
		item_id: Uuid,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			let mut state = self.write();
			let matches = state
				.items
				.get(&item_id)
				.is_some_and(|item| item.project_id == project_id && item.kind() == kind);

			if matches {
				state.items.remove(&item_id);
			}

			Ok(matches)
		})
	}

	fn find_example_by_source_turn<'a>(
		&'a self,
		project_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<KnowledgeItem>>> {
		Box::pin(async move {
			Ok(self
				.read()
				.items
				.values()
				.find(|item| {
					item.project_id == project_id
						&& item.source_turn_id == Some(turn_id)
						&& matches!(item.content, ItemContent::Example { .. })
				})
				.cloned())
		})
	}

	fn create_chat<'a>(&'a self, chat: &'a Chat) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.write();

			if !state.projects.contains_key(&chat.project_id) {
				return Err(Error::NotFound(format!("project {}", chat.project_id)));
			}

			state.chats.insert(chat.chat_id, chat.clone());

			Ok(())
		})
	}

	fn get_chat<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Option<Chat>>> {
		Box::pin(async move { Ok(self.read().chats.get(&chat_id).cloned()) })
	}

	fn insert_turn<'a>(&'a self, turn: &'a QueryTurn) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.write();

			if !state.chats.contains_key(&turn.chat_id) {
				return Err(Error::NotFound(format!("chat {}", turn.chat_id)));
			}
			if state
				.turns
				.values()
				.any(|existing| existing.chat_id == turn.chat_id && existing.position == turn.position)
			{
				return Err(Error::Conflict(format!(
					"chat {} already has a turn at position {}",
					turn.chat_id, turn.position
				)));
			}

			state.turns.insert(turn.turn_id, turn.clone());

			Ok(())
		})
	}

	fn set_turn_sql<'a>(&'a self, turn_id: Uuid, sql: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.write();
			let Some(turn) = state.turns.get_mut(&turn_id) else {
				return Err(Error::NotFound(format!("turn {turn_id}")));
			};

			if turn.sql.is_none() {
				turn.sql = Some(sql.to_string());
			}

			Ok(())
		})
	}

	fn get_turn<'a>(
		&'a self,
		chat_id: Uuid,
		turn_id: Uuid,
	) -> BoxFuture<'a, Result<Option<QueryTurn>>> {
		Box::pin(async move {
			Ok(self.read().turns.get(&turn_id).filter(|turn| turn.chat_id == chat_id).cloned())
		})
	}

	fn list_turns<'a>(&'a self, chat_id: Uuid) -> BoxFuture<'a, Result<Vec<QueryTurn>>> {
		Box::pin(async move {
			let state = self.read();
			let mut turns = state
				.turns
				.values()
				.filter(|turn| turn.chat_id == chat_id)
				.cloned()
				.collect::<Vec<_>>();

			turns.sort_by_key(|turn| turn.position);

			Ok(turns)
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
		Box::pin(async move {
			let mut state = self.write();
			let current = state
				.turns
				.get(&turn_id)
				.filter(|turn| turn.chat_id == chat_id)
				.map(|turn| turn.correctness)
				.ok_or_else(|| Error::NotFound(format!("turn {turn_id}")))?;

			if current != Correctness::Unset {
				return Err(Error::Conflict(format!("turn {turn_id} is already rated")));
			}

			let Some(chat) = state.chats.get_mut(&chat_id) else {
				return Err(Error::NotFound(format!("chat {chat_id}")));
			};

			if chat.feedback != from {
				return Err(Error::Conflict(format!("chat {chat_id} is no longer {from}")));
			}

			chat.feedback = to;

			if let Some(turn) = state.turns.get_mut(&turn_id) {
				turn.correctness = correctness;
			}

			Ok(())
		})
	}
}

#[derive(Default)]
pub struct MemoryIndex {
	records: RwLock<HashMap<(Kind, Uuid), IndexRecord>>,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored records for a project, across kinds.
	pub fn len_for_project(&self, project_id: Uuid) -> usize {
		self.records
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.values()
			.filter(|record| record.project_id == project_id)
			.count()
	}

	pub fn get(&self, kind: Kind, item_id: Uuid) -> Option<IndexRecord> {
		self.records.read().unwrap_or_else(|err| err.into_inner()).get(&(kind, item_id)).cloned()
	}
}
impl VectorIndex for MemoryIndex {
	fn backend(&self) -> &'static str {
		"memory"
	}

	fn upsert<'a>(&'a self, record: &'a IndexRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.records
				.write()
				.unwrap_or_else(|err| err.into_inner())
				.insert((record.kind, record.item_id), record.clone());

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
			let mut records = self.records.write().unwrap_or_else(|err| err.into_inner());

			if records.get(&(kind, item_id)).is_some_and(|record| record.project_id == project_id) {
				records.remove(&(kind, item_id));
			}

			Ok(())
		})
	}

	fn delete_project<'a>(&'a self, project_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.records
				.write()
				.unwrap_or_else(|err| err.into_inner())
				.retain(|_, record| record.project_id != project_id);

			Ok(())
		})
	}

	fn query<'a>(&'a self, query: IndexQuery<'a>) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			let records = self.records.read().unwrap_or_else(|err| err.into_inner());
			let mut hits = records
				.values()
				.filter(|record| {
					record.project_id == query.project_id
						&& record.kind == query.kind
						&& record.embedding_version == query.embedding_version
				})
				.map(|record| IndexHit {
					item_id: record.item_id,
					distance: index::cosine_distance(query.vector, &record.vector),
					created_at: record.created_at,
				})
				.collect::<Vec<_>>();

			index::sort_hits(&mut hits);
			hits.truncate(query.k as usize);

			Ok(hits)
		})
	}
}

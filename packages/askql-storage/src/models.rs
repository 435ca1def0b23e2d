use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::{Correctness, FeedbackState, Kind};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
	pub project_id: Uuid,
	pub name: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemContent {
	Ddl { ddl: String },
	Documentation { text: String },
	Example { question: String, sql: String },
}
impl ItemContent {
	pub fn kind(&self) -> Kind {
		match self {
			Self::Ddl { .. } => Kind::Ddl,
			Self::Documentation { .. } => Kind::Documentation,
			Self::Example { .. } => Kind::Example,
		}
	}
}

/// A DDL statement, documentation snippet or question/SQL example owned by one project.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeItem {
	pub item_id: Uuid,
	pub project_id: Uuid,
	pub content: ItemContent,
	pub metadata: Map<String, Value>,
	/// Set only on examples promoted from a chat turn.
	pub source_turn_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
}
impl KnowledgeItem {
	pub fn kind(&self) -> Kind {
		self.content.kind()
	}

	/// Text the item is embedded from. Examples embed question and SQL together.
	pub fn embedding_text(&self) -> String {
		match &self.content {
			ItemContent::Ddl { ddl } => ddl.clone(),
			ItemContent::Documentation { text } => text.clone(),
			ItemContent::Example { question, sql } => format!("{question}\n{sql}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
	pub chat_id: Uuid,
	pub project_id: Uuid,
	pub feedback: FeedbackState,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTurn {
	pub turn_id: Uuid,
	pub chat_id: Uuid,
	pub position: i32,
	pub question: String,
	pub sql: Option<String>,
	pub correctness: Correctness,
	pub created_at: OffsetDateTime,
}

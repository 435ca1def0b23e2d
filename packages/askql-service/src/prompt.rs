//! Renders retrieved context into a chat-completion request.
//!
//! Layout is fixed: schema, documentation, sample queries, earlier turns of the chat, rejected
//! attempts (regeneration only), then the question. The three knowledge sections are rendered even
//! when empty; the chat history section only when an earlier turn has SQL.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use askql_domain::Correctness;
use askql_storage::models::{ItemContent, QueryTurn};

use crate::retriever::{ContextBundle, RetrievedItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
	pub role: String,
	pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
	pub messages: Vec<ChatMessage>,
}
impl GenerationRequest {
	pub fn user_prompt(&self) -> &str {
		self.messages
			.iter()
			.rev()
			.find(|message| message.role == "user")
			.map(|message| message.content.as_str())
			.unwrap_or_default()
	}

	pub fn to_values(&self) -> Vec<Value> {
		self.messages
			.iter()
			.map(|message| serde_json::json!({ "role": message.role, "content": message.content }))
			.collect()
	}
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
	system_prompt: String,
	regeneration_system_prompt: String,
}
impl PromptAssembler {
	pub fn new(cfg: &askql_config::Generation) -> Self {
		Self {
			system_prompt: cfg.system_prompt.clone(),
			regeneration_system_prompt: cfg.regeneration_system_prompt.clone(),
		}
	}

	/// `history` holds the earlier turns of the chat, oldest first.
	pub fn assemble(
		&self,
		question: &str,
		bundle: &ContextBundle,
		history: &[QueryTurn],
	) -> GenerationRequest {
		let mut prompt = render_context(bundle, history);

		prompt.push_str(&format!("Generate SQL for: {question}\nSQL:"));

		request(&self.system_prompt, prompt)
	}

	/// Same context as [`Self::assemble`], plus the SQL the user already rejected for `question`.
	pub fn assemble_regeneration(
		&self,
		question: &str,
		bundle: &ContextBundle,
		history: &[QueryTurn],
		rejected_sql: &[String],
	) -> GenerationRequest {
		let mut prompt = render_context(bundle, history);
		let attempts = dedupe(rejected_sql.iter().map(|sql| format!("Incorrect SQL: {sql}")));

		push_section(&mut prompt, "Previous incorrect attempts", &attempts, "\n");
		prompt.push_str(&format!("Generate a corrected SQL query for: {question}\nSQL:"));

		request(&self.regeneration_system_prompt, prompt)
	}
}

fn request(system_prompt: &str, prompt: String) -> GenerationRequest {
	GenerationRequest {
		messages: vec![
			ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
			ChatMessage { role: "user".to_string(), content: prompt },
		],
	}
}

fn render_context(bundle: &ContextBundle, history: &[QueryTurn]) -> String {
	let mut prompt = String::new();
	let ddl = dedupe(bundle.ddl.iter().filter_map(|entry| match &entry.item.content {
		ItemContent::Ddl { ddl } => Some(ddl.trim().to_string()),
		_ => None,
	}));
	let docs = dedupe(bundle.documentation.iter().filter_map(|entry| match &entry.item.content {
		ItemContent::Documentation { text } => Some(text.trim().to_string()),
		_ => None,
	}));
	let examples = dedupe(bundle.examples.iter().filter_map(render_example));

	push_section(&mut prompt, "Database Schema", &ddl, "\n\n");
	push_section(&mut prompt, "Documentation", &docs, "\n\n");
	push_section(&mut prompt, "Sample Queries", &examples, "\n\n");

	let previous = history.iter().filter_map(render_turn).collect::<Vec<_>>();

	if !previous.is_empty() {
		push_section(&mut prompt, "Previous queries in this conversation", &previous, "\n\n");
	}

	prompt
}

fn render_turn(turn: &QueryTurn) -> Option<String> {
	let sql = turn.sql.as_deref()?;
	let correct = match turn.correctness {
		Correctness::Correct => "true",
		Correctness::Incorrect => "false",
		Correctness::Unset => "unknown",
	};

	Some(format!("Text: {}\nSQL: {}\nCorrect: {correct}", turn.question.trim(), sql.trim()))
}

fn render_example(entry: &RetrievedItem) -> Option<String> {
	match &entry.item.content {
		ItemContent::Example { question, sql } =>
			Some(format!("Text: {}\nSQL: {}", question.trim(), sql.trim())),
		_ => None,
	}
}

fn push_section(prompt: &mut String, header: &str, entries: &[String], separator: &str) {
	prompt.push_str(header);
	prompt.push_str(":\n");

	if !entries.is_empty() {
		prompt.push_str(&entries.join(separator));
		prompt.push('\n');
	}

	prompt.push('\n');
}

/// Drops exact repeats, keeping the first occurrence and the original order.
fn dedupe(entries: impl Iterator<Item = String>) -> Vec<String> {
	let mut seen = HashSet::new();

	entries.filter(|entry| seen.insert(entry.clone())).collect()
}

#[cfg(test)]
mod tests {
	use serde_json::Map;
	use time::OffsetDateTime;
	use uuid::Uuid;

	use askql_storage::models::KnowledgeItem;

	use super::*;

	fn entry(content: ItemContent, distance: f32) -> RetrievedItem {
		let item_id = Uuid::new_v4();

		RetrievedItem {
			item_id,
			distance,
			item: KnowledgeItem {
				item_id,
				project_id: Uuid::nil(),
				content,
				metadata: Map::new(),
				source_turn_id: None,
				created_at: OffsetDateTime::UNIX_EPOCH,
			},
		}
	}

	fn ddl(text: &str) -> RetrievedItem {
		entry(ItemContent::Ddl { ddl: text.to_string() }, 0.1)
	}

	fn assembler() -> PromptAssembler {
		PromptAssembler::new(&askql_config::Generation::default())
	}

	#[test]
	fn renders_empty_sections_and_question() {
		let bundle = ContextBundle {
			ddl: vec![ddl("CREATE TABLE users(id INT, name TEXT)")],
			..Default::default()
		};
		let request = assembler().assemble("list all users", &bundle, &[]);

		assert_eq!(
			request.user_prompt(),
			"Database Schema:\nCREATE TABLE users(id INT, name TEXT)\n\nDocumentation:\n\nSample Queries:\n\nGenerate SQL for: list all users\nSQL:"
		);
		assert_eq!(request.messages[0].role, "system");
		assert_eq!(request.messages[0].content, askql_config::DEFAULT_SYSTEM_PROMPT);
	}

	#[test]
	fn keeps_kind_order_and_drops_exact_duplicates() {
		let bundle = ContextBundle {
			ddl: vec![
				ddl("CREATE TABLE b(x INT)"),
				ddl("CREATE TABLE a(y INT)"),
				ddl("CREATE TABLE b(x INT)"),
			],
			documentation: vec![entry(
				ItemContent::Documentation { text: "a.y is a count".to_string() },
				0.3,
			)],
			examples: vec![
				entry(
					ItemContent::Example {
						question: "how many a".to_string(),
						sql: "SELECT count(*) FROM a;".to_string(),
					},
					0.2,
				),
				entry(
					ItemContent::Example {
						question: "how many a".to_string(),
						sql: "SELECT count(*) FROM a;".to_string(),
					},
					0.4,
				),
			],
		};
		let prompt = assembler().assemble("q", &bundle, &[]).user_prompt().to_string();

		assert_eq!(prompt.matches("CREATE TABLE b(x INT)").count(), 1);
		assert_eq!(prompt.matches("Text: how many a").count(), 1);

		let schema = prompt.find("CREATE TABLE b").expect("schema");
		let second = prompt.find("CREATE TABLE a").expect("schema");
		let docs = prompt.find("a.y is a count").expect("docs");
		let example = prompt.find("SQL: SELECT count(*) FROM a;").expect("example");
		let question = prompt.find("Generate SQL for: q").expect("question");

		assert!(schema < second && second < docs && docs < example && example < question);
	}

	#[test]
	fn regeneration_lists_rejected_sql_before_question() {
		let rejected = vec!["SELECT name FROM users;".to_string()];
		let request = assembler().assemble_regeneration(
			"list all users",
			&ContextBundle::default(),
			&[],
			&rejected,
		);
		let prompt = request.user_prompt();

		assert!(prompt.contains(
			"Sample Queries:\n\nPrevious incorrect attempts:\nIncorrect SQL: SELECT name FROM users;\n\n"
		));
		assert!(prompt.ends_with("Generate a corrected SQL query for: list all users\nSQL:"));
		assert_eq!(request.messages[0].content, askql_config::DEFAULT_REGENERATION_SYSTEM_PROMPT);
	}

	fn turn(question: &str, sql: Option<&str>, correctness: Correctness) -> QueryTurn {
		QueryTurn {
			turn_id: Uuid::new_v4(),
			chat_id: Uuid::nil(),
			position: 0,
			question: question.to_string(),
			sql: sql.map(str::to_string),
			correctness,
			created_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn earlier_turns_follow_sample_queries() {
		let history = vec![
			turn("list all users", Some("SELECT * FROM users;"), Correctness::Correct),
			turn("count them", None, Correctness::Unset),
			turn("only names", Some("SELECT name FROM users;"), Correctness::Unset),
		];
		let prompt = assembler()
			.assemble("now only the active ones", &ContextBundle::default(), &history)
			.user_prompt()
			.to_string();

		assert_eq!(
			prompt,
			"Database Schema:\n\nDocumentation:\n\nSample Queries:\n\nPrevious queries in this conversation:\nText: list all users\nSQL: SELECT * FROM users;\nCorrect: true\n\nText: only names\nSQL: SELECT name FROM users;\nCorrect: unknown\n\nGenerate SQL for: now only the active ones\nSQL:"
		);
	}

	#[test]
	fn regeneration_places_history_before_rejected_attempts() {
		let history =
			vec![turn("list all users", Some("SELECT name FROM users;"), Correctness::Incorrect)];
		let rejected = vec!["SELECT name FROM users;".to_string()];
		let request = assembler().assemble_regeneration(
			"list all users",
			&ContextBundle::default(),
			&history,
			&rejected,
		);
		let prompt = request.user_prompt();
		let previous = prompt.find("Previous queries in this conversation:").expect("history");
		let attempts = prompt.find("Previous incorrect attempts:").expect("attempts");

		assert!(prompt.contains("Correct: false"));
		assert!(previous < attempts);
	}

	#[test]
	fn messages_serialize_as_role_and_content() {
		let values = assembler().assemble("q", &ContextBundle::default(), &[]).to_values();

		assert_eq!(values.len(), 2);
		assert_eq!(values[1]["role"], "user");
		assert!(values[1]["content"].as_str().is_some_and(|content| content.ends_with("SQL:")));
	}
}

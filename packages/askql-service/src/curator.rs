use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::FeedbackState;
use askql_storage::models::{ItemContent, KnowledgeItem};

use crate::{AskqlService, Error, Result, knowledge};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromoteRequest {
	pub chat_id: Uuid,
	pub turn_id: Uuid,
	#[serde(default)]
	pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromoteResponse {
	pub feedback_enabled: FeedbackState,
	pub item_id: Uuid,
	/// `false` when the turn had already been promoted.
	pub created: bool,
}

impl AskqlService {
	/// Turns a confirmed-correct turn into an example of the chat's project.
	///
	/// Promoting the same turn again returns the existing example without writing.
	pub async fn promote_sample(&self, req: PromoteRequest) -> Result<PromoteResponse> {
		let lock = self.chat_locks.get(req.chat_id);
		let _guard = lock.lock().await;
		let chat = self.load_chat(req.chat_id).await?;
		let turn = self
			.repo
			.get_turn(chat.chat_id, req.turn_id)
			.await?
			.ok_or_else(|| Error::not_found("Turn", req.turn_id))?;

		chat.feedback.check_promotion(turn.correctness)?;

		let metadata = req.metadata.unwrap_or_default();

		knowledge::validate_metadata(&metadata)?;

		let existing = self.repo.find_example_by_source_turn(chat.project_id, turn.turn_id).await?;

		if let Some(existing) = existing {
			return Ok(PromoteResponse {
				feedback_enabled: chat.feedback,
				item_id: existing.item_id,
				created: false,
			});
		}

		let Some(sql) = turn.sql else {
			return Err(Error::InvalidTransition {
				message: "Turn has no generated SQL to promote.".to_string(),
			});
		};
		let item = KnowledgeItem {
			item_id: Uuid::new_v4(),
			project_id: chat.project_id,
			content: ItemContent::Example { question: turn.question, sql },
			metadata,
			source_turn_id: Some(turn.turn_id),
			created_at: OffsetDateTime::now_utc(),
		};

		if self.insert_indexed(&item).await?.is_none() {
			let existing = self
				.repo
				.find_example_by_source_turn(chat.project_id, turn.turn_id)
				.await?
				.ok_or_else(|| Error::not_found("Example for turn", turn.turn_id))?;

			return Ok(PromoteResponse {
				feedback_enabled: chat.feedback,
				item_id: existing.item_id,
				created: false,
			});
		}

		tracing::info!(
			chat_id = %chat.chat_id,
			turn_id = %turn.turn_id,
			item_id = %item.item_id,
			"Turn promoted to example."
		);

		Ok(PromoteResponse { feedback_enabled: chat.feedback, item_id: item.item_id, created: true })
	}
}

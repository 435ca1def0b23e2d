use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use askql_domain::{Correctness, FeedbackState, Verdict};
use askql_storage::models::{Chat, QueryTurn};

use crate::{AskqlService, Error, Result, prompt::GenerationRequest};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatView {
	pub chat_id: Uuid,
	pub project_id: Uuid,
	pub feedback_enabled: FeedbackState,
	pub solicits_feedback: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub turns: Vec<TurnView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnView {
	pub turn_id: Uuid,
	pub position: i32,
	pub question: String,
	pub sql: Option<String>,
	pub correctness: Correctness,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<QueryTurn> for TurnView {
	fn from(turn: QueryTurn) -> Self {
		Self {
			turn_id: turn.turn_id,
			position: turn.position,
			question: turn.question,
			sql: turn.sql,
			correctness: turn.correctness,
			created_at: turn.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitQuestionRequest {
	pub chat_id: Uuid,
	pub question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitFeedbackRequest {
	pub chat_id: Uuid,
	pub turn_id: Uuid,
	pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
	pub feedback_enabled: FeedbackState,
	pub solicits_feedback: bool,
	/// SQL regenerated after the first `incorrect` verdict of a chat.
	pub corrected_sql: Option<String>,
	pub regenerated_turn: Option<TurnView>,
}

impl AskqlService {
	pub async fn start_chat(&self, project_id: Uuid) -> Result<ChatView> {
		if self.repo.get_project(project_id).await?.is_none() {
			return Err(Error::not_found("Project", project_id));
		}

		let chat = Chat {
			chat_id: Uuid::new_v4(),
			project_id,
			feedback: FeedbackState::Unset,
			created_at: OffsetDateTime::now_utc(),
		};

		self.repo.create_chat(&chat).await?;

		Ok(chat_view(chat, Vec::new()))
	}

	pub async fn get_chat(&self, chat_id: Uuid) -> Result<ChatView> {
		let chat = self.load_chat(chat_id).await?;
		let turns = self.repo.list_turns(chat_id).await?;

		Ok(chat_view(chat, turns))
	}

	/// Appends a turn for `question` and fills it with generated SQL.
	///
	/// The turn is persisted before generation starts. When generation fails its SQL stays null
	/// and the error is returned.
	pub async fn submit_question(&self, req: SubmitQuestionRequest) -> Result<TurnView> {
		let question = req.question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}

		let lock = self.chat_locks.get(req.chat_id);
		let _guard = lock.lock().await;
		let chat = self.load_chat(req.chat_id).await?;
		let turns = self.repo.list_turns(chat.chat_id).await?;
		let turn = self.append_turn(&chat, &turns, question).await?;
		let bundle = self.retrieve(chat.project_id, question, self.default_limits()).await?;
		let request = self.prompts.assemble(question, &bundle, &turns);

		self.fill_turn(turn, &request).await
	}

	pub async fn submit_feedback(&self, req: SubmitFeedbackRequest) -> Result<FeedbackResponse> {
		let lock = self.chat_locks.get(req.chat_id);
		let _guard = lock.lock().await;
		let chat = self.load_chat(req.chat_id).await?;
		let turn = self
			.repo
			.get_turn(chat.chat_id, req.turn_id)
			.await?
			.ok_or_else(|| Error::not_found("Turn", req.turn_id))?;

		if turn.sql.is_none() {
			return Err(Error::InvalidTransition {
				message: "Turn has no generated SQL to rate.".to_string(),
			});
		}

		let verdict = Verdict::from_is_correct(req.is_correct);
		let transition = chat.feedback.apply(turn.correctness, verdict)?;

		if transition.record {
			self.repo
				.record_feedback(
					chat.chat_id,
					turn.turn_id,
					Correctness::from(verdict),
					transition.from,
					transition.to,
				)
				.await?;
		}
		if transition.changes_state() {
			tracing::info!(
				chat_id = %chat.chat_id,
				turn_id = %turn.turn_id,
				from = transition.from.as_str(),
				to = transition.to.as_str(),
				"Chat feedback calibrated."
			);
		}

		let mut response = FeedbackResponse {
			feedback_enabled: transition.to,
			solicits_feedback: transition.to.solicits_feedback(),
			corrected_sql: None,
			regenerated_turn: None,
		};

		if transition.regenerate {
			let regenerated = self.regenerate(&chat, &turn.question).await?;

			response.corrected_sql = regenerated.sql.clone();
			response.regenerated_turn = Some(regenerated);
		}

		Ok(response)
	}

	pub(crate) async fn load_chat(&self, chat_id: Uuid) -> Result<Chat> {
		self.repo.get_chat(chat_id).await?.ok_or_else(|| Error::not_found("Chat", chat_id))
	}

	/// Generates SQL for `question` again, avoiding every SQL already rated incorrect for it.
	async fn regenerate(&self, chat: &Chat, question: &str) -> Result<TurnView> {
		let turns = self.repo.list_turns(chat.chat_id).await?;
		let rejected = turns
			.iter()
			.filter(|turn| turn.question == question && turn.correctness == Correctness::Incorrect)
			.filter_map(|turn| turn.sql.clone())
			.collect::<Vec<_>>();
		let turn = self.append_turn(chat, &turns, question).await?;
		let bundle = self.retrieve(chat.project_id, question, self.default_limits()).await?;
		let request = self.prompts.assemble_regeneration(question, &bundle, &turns, &rejected);

		self.fill_turn(turn, &request).await
	}

	async fn append_turn(
		&self,
		chat: &Chat,
		turns: &[QueryTurn],
		question: &str,
	) -> Result<QueryTurn> {
		let position = turns.iter().map(|turn| turn.position + 1).max().unwrap_or(0);
		let turn = QueryTurn {
			turn_id: Uuid::new_v4(),
			chat_id: chat.chat_id,
			position,
			question: question.to_string(),
			sql: None,
			correctness: Correctness::Unset,
			created_at: OffsetDateTime::now_utc(),
		};

		self.repo.insert_turn(&turn).await?;

		Ok(turn)
	}

	async fn fill_turn(
		&self,
		mut turn: QueryTurn,
		request: &GenerationRequest,
	) -> Result<TurnView> {
		let sql = match self.generator.generate(request).await {
			Ok(sql) => sql,
			Err(err) => {
				tracing::warn!(
					error = %err,
					chat_id = %turn.chat_id,
					turn_id = %turn.turn_id,
					"SQL generation failed."
				);

				return Err(err);
			},
		};

		self.repo.set_turn_sql(turn.turn_id, &sql).await?;

		turn.sql = Some(sql);

		Ok(TurnView::from(turn))
	}
}

fn chat_view(chat: Chat, turns: Vec<QueryTurn>) -> ChatView {
	ChatView {
		chat_id: chat.chat_id,
		project_id: chat.project_id,
		feedback_enabled: chat.feedback,
		solicits_feedback: chat.feedback.solicits_feedback(),
		created_at: chat.created_at,
		turns: turns.into_iter().map(TurnView::from).collect(),
	}
}

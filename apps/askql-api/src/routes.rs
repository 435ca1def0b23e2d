use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use askql_domain::Kind;
use askql_service::{
	AddItemResponse, ChatView, Error, FeedbackResponse, ItemView, ProjectView, PromoteRequest,
	PromoteResponse, ReindexReport, SubmitFeedbackRequest, SubmitQuestionRequest, TurnView,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
	pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddDdlBody {
	pub ddl: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentationBody {
	pub text: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddExampleBody {
	pub question: String,
	pub sql: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionBody {
	pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
	pub turn_id: Uuid,
	pub is_correct: bool,
}

#[derive(Debug, Deserialize)]
pub struct PromoteBody {
	pub turn_id: Uuid,
	#[serde(default)]
	pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, code) = match &err {
			Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
			Error::Generation { .. } => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
			Error::Provider { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR"),
			Error::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
			Error::Index { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INDEX_ERROR"),
		};

		if status.is_server_error() {
			tracing::error!(error = %err, error_code = code, "Request failed.");
		}

		Self::new(status, code, err.to_string())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/projects", post(create_project))
		.route("/v1/projects/{project_id}", get(get_project).delete(delete_project))
		.route("/v1/projects/{project_id}/ddl", post(add_ddl))
		.route("/v1/projects/{project_id}/documentation", post(add_documentation))
		.route("/v1/projects/{project_id}/examples", post(add_example))
		.route("/v1/projects/{project_id}/items/{kind}", get(list_items))
		.route("/v1/projects/{project_id}/items/{kind}/{item_id}", delete(delete_item))
		.route("/v1/projects/{project_id}/chats", post(start_chat))
		.route("/v1/chats/{chat_id}", get(get_chat))
		.route("/v1/chats/{chat_id}/questions", post(submit_question))
		.route("/v1/chats/{chat_id}/feedback", post(submit_feedback))
		.route("/v1/chats/{chat_id}/promote", post(promote_sample))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/projects/{project_id}/reindex", post(reindex_project))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn create_project(
	State(state): State<AppState>,
	Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<ProjectView>), ApiError> {
	let project = state.service.create_project(&body.name).await?;

	Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectView>, ApiError> {
	Ok(Json(state.service.get_project(project_id).await?))
}

async fn delete_project(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.service.delete_project(project_id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn add_ddl(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
	Json(body): Json<AddDdlBody>,
) -> Result<(StatusCode, Json<AddItemResponse>), ApiError> {
	let response = state.service.add_ddl(project_id, &body.ddl, body.metadata).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn add_documentation(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
	Json(body): Json<AddDocumentationBody>,
) -> Result<(StatusCode, Json<AddItemResponse>), ApiError> {
	let response = state.service.add_documentation(project_id, &body.text, body.metadata).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn add_example(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
	Json(body): Json<AddExampleBody>,
) -> Result<(StatusCode, Json<AddItemResponse>), ApiError> {
	let response =
		state.service.add_example(project_id, &body.question, &body.sql, body.metadata).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn list_items(
	State(state): State<AppState>,
	Path((project_id, kind)): Path<(Uuid, String)>,
) -> Result<Json<Vec<ItemView>>, ApiError> {
	let kind = parse_kind(&kind)?;

	Ok(Json(state.service.list_items(project_id, Some(kind)).await?))
}

async fn delete_item(
	State(state): State<AppState>,
	Path((project_id, kind, item_id)): Path<(Uuid, String, Uuid)>,
) -> Result<StatusCode, ApiError> {
	let kind = parse_kind(&kind)?;

	state.service.delete_item(project_id, kind, item_id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn start_chat(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ChatView>), ApiError> {
	let chat = state.service.start_chat(project_id).await?;

	Ok((StatusCode::CREATED, Json(chat)))
}

async fn get_chat(
	State(state): State<AppState>,
	Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatView>, ApiError> {
	Ok(Json(state.service.get_chat(chat_id).await?))
}

async fn submit_question(
	State(state): State<AppState>,
	Path(chat_id): Path<Uuid>,
	Json(body): Json<QuestionBody>,
) -> Result<Json<TurnView>, ApiError> {
	let turn = state
		.service
		.submit_question(SubmitQuestionRequest { chat_id, question: body.question })
		.await?;

	Ok(Json(turn))
}

async fn submit_feedback(
	State(state): State<AppState>,
	Path(chat_id): Path<Uuid>,
	Json(body): Json<FeedbackBody>,
) -> Result<Json<FeedbackResponse>, ApiError> {
	let response = state
		.service
		.submit_feedback(SubmitFeedbackRequest {
			chat_id,
			turn_id: body.turn_id,
			is_correct: body.is_correct,
		})
		.await?;

	Ok(Json(response))
}

async fn promote_sample(
	State(state): State<AppState>,
	Path(chat_id): Path<Uuid>,
	Json(body): Json<PromoteBody>,
) -> Result<Json<PromoteResponse>, ApiError> {
	let response = state
		.service
		.promote_sample(PromoteRequest { chat_id, turn_id: body.turn_id, metadata: body.metadata })
		.await?;

	Ok(Json(response))
}

async fn reindex_project(
	State(state): State<AppState>,
	Path(project_id): Path<Uuid>,
) -> Result<Json<ReindexReport>, ApiError> {
	Ok(Json(state.service.reindex_project(project_id).await?))
}

fn parse_kind(raw: &str) -> Result<Kind, ApiError> {
	raw.parse::<Kind>()
		.map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", err.to_string()))
}

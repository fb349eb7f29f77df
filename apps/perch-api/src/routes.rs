use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
	routing::get,
};
use serde::{Deserialize, Serialize};

use perch_service::{
	ConversationListResponse, Error as ServiceError, HistoryResponse, ImageUpload, TurnRequest,
	TurnResponse,
};

use crate::state::AppState;

const TEXT_FIELD: &str = "text";
const CONVERSATION_ID_FIELD: &str = "conversationId";
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize)]
struct HistoryQuery {
	#[serde(rename = "conversationId")]
	conversation_id: Option<String>,
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
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::Validation { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::NotFound { message } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Persistence { message } => {
				tracing::error!(error = %message, "Turn failed after writes.");
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", message)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage failure.");
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
		}
	}
}
impl From<MultipartError> for ApiError {
	fn from(err: MultipartError) -> Self {
		Self::new(err.status(), "invalid_request", err.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };
		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	let body_limit = state.service.cfg.service.max_request_bytes;
	Router::new()
		.route("/health", get(health))
		.route("/api/chat", get(history).post(submit_turn))
		.route("/api/conversations", get(list_conversations))
		.route("/api/uploads/{filename}", get(serve_upload))
		.layer(DefaultBodyLimit::max(body_limit))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn submit_turn(
	State(state): State<AppState>,
	multipart: Multipart,
) -> Result<Json<TurnResponse>, ApiError> {
	let request = read_turn_form(multipart).await?;
	let response = state.service.handle_turn(request).await?;
	Ok(Json(response))
}

async fn history(
	State(state): State<AppState>,
	Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
	let response = state.service.history(query.conversation_id.as_deref()).await?;
	Ok(Json(response))
}

async fn list_conversations(
	State(state): State<AppState>,
) -> Result<Json<ConversationListResponse>, ApiError> {
	let response = state.service.list_conversations().await?;
	Ok(Json(response))
}

async fn serve_upload(
	State(state): State<AppState>,
	Path(filename): Path<String>,
) -> Result<Response, ApiError> {
	let image = state.service.read_image(&filename).await?;
	Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

/// Unknown fields are skipped. An empty file part counts as no image.
async fn read_turn_form(mut multipart: Multipart) -> Result<TurnRequest, ApiError> {
	let mut request = TurnRequest::default();
	while let Some(field) = multipart.next_field().await? {
		let name = field.name().map(str::to_string);
		match name.as_deref() {
			Some(TEXT_FIELD) => request.text = Some(field.text().await?),
			Some(CONVERSATION_ID_FIELD) => request.conversation_id = Some(field.text().await?),
			Some(IMAGE_FIELD) => {
				let file_name = field.file_name().map(str::to_string);
				let content_type = field.content_type().map(str::to_string);
				let bytes = field.bytes().await?;
				if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
					continue;
				}
				request.image =
					Some(ImageUpload { bytes: bytes.to_vec(), content_type, file_name });
			},
			_ => {},
		}
	}
	Ok(request)
}

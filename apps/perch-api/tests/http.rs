use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::Value;
use tower::util::ServiceExt;

use perch_api::{routes, state::AppState};
use perch_config::CompletionProviderConfig;
use perch_domain::prompt::FALLBACK_MARKER;
use perch_providers::completion::ChatMessage;
use perch_service::{BoxFuture, CompletionProvider, Providers};
use perch_storage::db::Db;
use perch_testkit::{ScratchDir, TestDatabase, UNREACHABLE_API_BASE};

const BOUNDARY: &str = "perch-test-boundary";

enum Part<'a> {
	Text { name: &'a str, value: &'a str },
	File { name: &'a str, file_name: &'a str, content_type: &'a str, bytes: &'a [u8] },
}

struct UserRowEraser {
	db: Db,
}
impl CompletionProvider for UserRowEraser {
	fn complete<'a>(
		&'a self,
		_cfg: &'a CompletionProviderConfig,
		_messages: &'a [ChatMessage],
	) -> BoxFuture<'a, perch_providers::Result<String>> {
		Box::pin(async move {
			sqlx::query("DELETE FROM messages WHERE role = 'user'")
				.execute(&self.db.pool)
				.await
				.map_err(|err| perch_providers::Error::Completion { message: err.to_string() })?;

			Ok("Reply written after the question vanished.".to_string())
		})
	}
}

struct TestApp {
	app: Router,
	_db: TestDatabase,
	_uploads: ScratchDir,
}

async fn test_app(retrieval_base: &str, completion_base: &str) -> TestApp {
	let db = TestDatabase::new();
	let uploads = ScratchDir::new("perch_api_uploads");
	let config = perch_testkit::test_config(&db, &uploads, retrieval_base, completion_base);
	let state = AppState::new(config).await.expect("Failed to initialize app state.");

	TestApp { app: routes::router(state), _db: db, _uploads: uploads }
}

async fn mock_retrieval(server: &mut ServerGuard) -> Mock {
	let body = serde_json::json!({
		"query": "What species is this?",
		"k": 5,
		"results": [{
			"doc_id": "finch-guide",
			"title": "Finch Guide",
			"url": "https://example.org/finches",
			"text": "Finches have short beaks.",
			"score": 0.91
		}]
	});

	server
		.mock("GET", "/search")
		.match_query(Matcher::Any)
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(body.to_string())
		.create_async()
		.await
}

async fn mock_completion(server: &mut ServerGuard, status: usize, content: &str) -> Mock {
	let body = serde_json::json!({ "choices": [{ "message": { "content": content } }] });

	server
		.mock("POST", "/v1/chat/completions")
		.with_status(status)
		.with_header("content-type", "application/json")
		.with_body(body.to_string())
		.create_async()
		.await
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
	let mut body = Vec::new();

	for part in parts {
		body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());

		match part {
			Part::Text { name, value } => {
				body.extend_from_slice(
					format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
				);
				body.extend_from_slice(value.as_bytes());
			},
			Part::File { name, file_name, content_type, bytes } => {
				let disposition = format!(
					"Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\""
				);

				body.extend_from_slice(
					format!("{disposition}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
				);
				body.extend_from_slice(bytes);
			},
		}

		body.extend_from_slice(b"\r\n");
	}

	body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

	body
}

fn turn_request(parts: &[Part<'_>]) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/api/chat")
		.header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
		.body(Body::from(multipart_body(parts)))
		.expect("Failed to build request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.expect("Failed to call app.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = serde_json::from_slice(&body).expect("Failed to parse response.");

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let response = app.app.clone().oneshot(get("/health")).await.expect("Failed to call health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn text_turn_is_grounded_and_persisted() {
	let mut retrieval = mockito::Server::new_async().await;
	let mut completion = mockito::Server::new_async().await;
	let search = mock_retrieval(&mut retrieval).await;
	let complete = mock_completion(&mut completion, 200, "It is most likely a finch [1].").await;
	let app = test_app(&retrieval.url(), &completion.url()).await;
	let (status, json) = send_json(
		&app.app,
		turn_request(&[Part::Text { name: "text", value: "What species is this?" }]),
	)
	.await;

	search.assert_async().await;
	complete.assert_async().await;

	assert_eq!(status, StatusCode::OK, "Unexpected response: {json}");
	assert_eq!(json["usedFallbackQuery"], false);
	assert_eq!(json["userMessage"]["role"], "user");
	assert_eq!(json["userMessage"]["text"], "What species is this?");
	assert!(json["assistantMessage"]["text"].as_str().is_some_and(|text| text.contains("[1]")));
	assert_eq!(json["assistantMessage"]["citations"][0]["title"], "Finch Guide");
	assert_eq!(json["assistantMessage"]["citations"].as_array().map(Vec::len), Some(1));

	let conversation_id =
		json["conversationId"].as_str().expect("Expected conversation id.").to_string();
	let (status, history) =
		send_json(&app.app, get(&format!("/api/chat?conversationId={conversation_id}"))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(history["conversationId"], conversation_id.as_str());
	assert_eq!(history["messages"].as_array().map(Vec::len), Some(2));
	assert_eq!(history["messages"][0]["id"], json["userMessage"]["id"]);
	assert_eq!(history["messages"][1]["id"], json["assistantMessage"]["id"]);

	let (status, listing) = send_json(&app.app, get("/api/conversations")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(listing["conversations"][0]["id"], conversation_id.as_str());
	assert_eq!(listing["conversations"][0]["title"], "What species is this?");
	assert!(listing["conversations"][0]["lastUpdatedAt"].is_i64());
}

#[tokio::test]
async fn image_only_turn_degrades_and_serves_upload() {
	let mut completion = mockito::Server::new_async().await;
	let _complete = mock_completion(&mut completion, 500, "").await;
	let app = test_app(UNREACHABLE_API_BASE, &completion.url()).await;
	let png = perch_testkit::png_bytes(1_024);
	let (status, json) = send_json(
		&app.app,
		turn_request(&[
			Part::Text { name: "text", value: "" },
			Part::File {
				name: "image",
				file_name: "finch.png",
				content_type: "image/png",
				bytes: &png,
			},
		]),
	)
	.await;

	assert_eq!(status, StatusCode::OK, "Unexpected response: {json}");
	assert_eq!(json["usedFallbackQuery"], true);
	assert_eq!(
		json["degraded"],
		serde_json::json!(["fallback_query", "retrieval_offline", "completion_failed"])
	);
	assert_eq!(json["assistantMessage"]["citations"], serde_json::json!([]));

	let text = json["assistantMessage"]["text"].as_str().expect("Expected assistant text.");

	assert!(text.contains(FALLBACK_MARKER), "Missing fallback marker in {text:?}");
	assert!(text.contains("generic query"), "Missing fallback note in {text:?}");
	assert_eq!(json["userMessage"]["imageName"], "finch.png");

	let image_url = json["userMessage"]["imageUrl"].as_str().expect("Expected image url.");
	let response = app.app.clone().oneshot(get(image_url)).await.expect("Failed to fetch upload.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
		Some("image/png")
	);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read upload body.");

	assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn empty_turn_is_bad_request() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let (status, json) =
		send_json(&app.app, turn_request(&[Part::Text { name: "text", value: "   " }])).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");

	let (_, listing) = send_json(&app.app, get("/api/conversations")).await;

	assert_eq!(listing["conversations"], serde_json::json!([]));
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let (status, json) = send_json(
		&app.app,
		turn_request(&[
			Part::Text { name: "conversationId", value: "missing" },
			Part::Text { name: "text", value: "hello" },
		]),
	)
	.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "not_found");

	let (_, listing) = send_json(&app.app, get("/api/conversations")).await;

	assert_eq!(listing["conversations"], serde_json::json!([]));
}

#[tokio::test]
async fn oversized_image_is_bad_request() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let png = perch_testkit::png_bytes(6 * 1_024 * 1_024);
	let (status, json) = send_json(
		&app.app,
		turn_request(&[Part::File {
			name: "image",
			file_name: "huge.png",
			content_type: "image/png",
			bytes: &png,
		}]),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");
	assert_eq!(json["message"], "File too large. Maximum size is 5MB.");

	let (_, listing) = send_json(&app.app, get("/api/conversations")).await;

	assert_eq!(listing["conversations"], serde_json::json!([]));
}

#[tokio::test]
async fn history_requires_known_conversation() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let (missing, _) = send_json(&app.app, get("/api/chat")).await;
	let (unknown, json) = send_json(&app.app, get("/api/chat?conversationId=nope")).await;

	assert_eq!(missing, StatusCode::BAD_REQUEST);
	assert_eq!(unknown, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "not_found");
}

#[tokio::test]
async fn upload_names_are_checked() {
	let app = test_app(UNREACHABLE_API_BASE, UNREACHABLE_API_BASE).await;
	let (unsafe_status, json) = send_json(&app.app, get("/api/uploads/.hidden.png")).await;
	let (missing_status, _) = send_json(&app.app, get("/api/uploads/absent.png")).await;

	assert_eq!(unsafe_status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "invalid_request");
	assert_eq!(missing_status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lost_user_message_is_a_persistence_error() {
	let db = TestDatabase::new();
	let uploads = ScratchDir::new("perch_api_uploads");
	let config =
		perch_testkit::test_config(&db, &uploads, UNREACHABLE_API_BASE, UNREACHABLE_API_BASE);
	let eraser_db =
		Db::connect(&config.storage.sqlite).await.expect("Failed to connect to test database.");
	let providers = Providers {
		completion: Arc::new(UserRowEraser { db: eraser_db }),
		..Providers::default()
	};
	let state =
		AppState::with_providers(config, providers).await.expect("Failed to initialize app state.");
	let app = routes::router(state);
	let (status, json) =
		send_json(&app, turn_request(&[Part::Text { name: "text", value: "hello" }])).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(json["error_code"], "persistence_error");
	assert!(json["message"].as_str().is_some_and(|message| message.contains("read back")));
}

//! Integration test: start a fake VANT AI backend with axum on a free port and drive the real
//! HTTP client (and the controller) against it. The server task is left running when the test ends.

use axum::extract::{Form, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vant::api::{Backend, BackendClient, BackendError};
use vant::config::ChatMode;
use vant::controller::Controller;
use vant::model::{Document, Role, UploadFile};
use vant::transcript::{EntryBody, WELCOME_TEXT};

#[derive(Default)]
struct FakeState {
    documents: Vec<String>,
    sessions: Vec<(String, String)>,
    chats: Vec<HashMap<String, String>>,
    model: Option<String>,
}

type Shared = Arc<Mutex<FakeState>>;

async fn process(State(s): State<Shared>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("").to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        if bytes.is_empty() {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "Cannot index an empty file" })),
            )
                .into_response();
        }
        s.lock().unwrap().documents.push(name.clone());
        return Json(json!({
            "status": "success",
            "message": format!("{} added to VANT AI database.", name)
        }))
        .into_response();
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "error", "message": "missing file" })),
    )
        .into_response()
}

async fn chat(State(s): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
    let message = form.get("message").cloned().unwrap_or_default();
    s.lock().unwrap().chats.push(form);
    Json(json!({
        "status": "success",
        "response": format!("You asked: **{}**", message),
        "sources": ["q3.pdf", "notes.txt"]
    }))
}

async fn list_documents(State(s): State<Shared>) -> Json<serde_json::Value> {
    Json(json!({ "documents": s.lock().unwrap().documents.clone() }))
}

async fn delete_document(State(s): State<Shared>, Path(name): Path<String>) -> Json<serde_json::Value> {
    let mut g = s.lock().unwrap();
    let before = g.documents.len();
    g.documents.retain(|d| d != &name);
    if g.documents.len() == before {
        Json(json!({ "status": "error", "message": format!("{} not found", name) }))
    } else {
        Json(json!({ "status": "success" }))
    }
}

async fn summarize(Path(name): Path<String>) -> Response {
    if name == "broken.pdf" {
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response();
    }
    Json(json!({ "status": "success", "summary": format!("{} in one line.", name) })).into_response()
}

async fn list_sessions(State(s): State<Shared>) -> Json<serde_json::Value> {
    let sessions: Vec<serde_json::Value> = s
        .lock()
        .unwrap()
        .sessions
        .iter()
        .map(|(id, title)| json!({ "id": id, "title": title }))
        .collect();
    Json(json!({ "sessions": sessions }))
}

async fn create_session(State(s): State<Shared>) -> Json<serde_json::Value> {
    let mut g = s.lock().unwrap();
    let id = format!("sess-{}", g.sessions.len() + 1);
    g.sessions.insert(0, (id.clone(), "New Chat".to_string()));
    Json(json!({ "session_id": id }))
}

async fn history(Path(id): Path<String>) -> Json<serde_json::Value> {
    if id == "sess-with-history" {
        Json(json!({ "messages": [
            { "role": "user", "content": "What changed in Q3?" },
            { "role": "assistant", "content": "Revenue rose **12%**." }
        ]}))
    } else {
        Json(json!({ "messages": [] }))
    }
}

async fn delete_session(State(s): State<Shared>, Path(id): Path<String>) -> Json<serde_json::Value> {
    s.lock().unwrap().sessions.retain(|(sid, _)| sid != &id);
    Json(json!({ "status": "success" }))
}

async fn list_models(State(s): State<Shared>) -> Json<serde_json::Value> {
    Json(json!({
        "models": [
            { "id": "llama-3.3-70b-versatile", "name": "Llama 3.3 70B" },
            { "id": "gemma2-9b-it", "name": "Gemma 2 9B" }
        ],
        "current": s.lock().unwrap().model.clone()
    }))
}

async fn change_model(State(s): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
    match form.get("model_id") {
        Some(id) if id == "gemma2-9b-it" || id == "llama-3.3-70b-versatile" => {
            s.lock().unwrap().model = Some(id.clone());
            Json(json!({ "status": "success" }))
        }
        _ => Json(json!({ "status": "error", "message": "Unknown model" })),
    }
}

async fn start_backend() -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(FakeState::default()));
    let app = Router::new()
        .route("/process", post(process))
        .route("/chat", post(chat))
        .route("/documents", get(list_documents))
        .route("/documents/:name", delete(delete_document))
        .route("/summarize/:name", get(summarize))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id/history", get(history))
        .route("/sessions/:id", delete(delete_session))
        .route("/models", get(list_models))
        .route("/models/change", post(change_model))
        .with_state(shared.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), shared)
}

#[tokio::test]
async fn upload_and_list_documents() {
    let (url, shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();

    let message = client
        .process(UploadFile::new("report.pdf", b"%PDF-1.4 quarterly".to_vec()))
        .await
        .unwrap();
    assert_eq!(message, "report.pdf added to VANT AI database.");

    let docs = client.list_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].filename, "report.pdf");
    assert_eq!(shared.lock().unwrap().documents, vec!["report.pdf"]);
}

#[tokio::test]
async fn upload_error_carries_server_message() {
    let (url, _shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();
    match client.process(UploadFile::new("empty.txt", Vec::new())).await {
        Err(BackendError::Api(m)) => assert_eq!(m, "Cannot index an empty file"),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn chat_posts_form_fields() {
    let (url, shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();

    let reply = client.chat("What is Q3 revenue?", Some("sess-9")).await.unwrap();
    assert_eq!(reply.response, "You asked: **What is Q3 revenue?**");
    assert_eq!(reply.sources, vec!["q3.pdf", "notes.txt"]);

    client.chat("no session", None).await.unwrap();
    let state = shared.lock().unwrap();
    let chats = &state.chats;
    assert_eq!(chats[0].get("message").map(String::as_str), Some("What is Q3 revenue?"));
    assert_eq!(chats[0].get("session_id").map(String::as_str), Some("sess-9"));
    assert!(!chats[1].contains_key("session_id"));
}

#[tokio::test]
async fn document_names_are_path_encoded() {
    let (url, shared) = start_backend().await;
    shared.lock().unwrap().documents = vec!["Q3 report #2.pdf".into(), "a.txt".into()];
    let client = BackendClient::new(&url, None).unwrap();

    client.delete_document("Q3 report #2.pdf").await.unwrap();
    assert_eq!(shared.lock().unwrap().documents, vec!["a.txt"]);

    match client.delete_document("missing.pdf").await {
        Err(BackendError::Api(m)) => assert_eq!(m, "missing.pdf not found"),
        other => panic!("expected api error, got {:?}", other),
    }

    assert_eq!(
        client.summarize("Q3 report #2.pdf").await.unwrap(),
        "Q3 report #2.pdf in one line."
    );
}

#[tokio::test]
async fn non_json_failure_becomes_api_error() {
    let (url, _shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();
    match client.summarize("broken.pdf").await {
        Err(BackendError::Api(m)) => {
            assert!(m.starts_with("503"), "got {}", m);
            assert!(m.ends_with("upstream down"), "got {}", m);
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn session_endpoints() {
    let (url, _shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();

    assert!(client.list_sessions().await.unwrap().is_empty());
    let id = client.create_session().await.unwrap();
    assert_eq!(id, "sess-1");
    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions[0].title, "New Chat");

    let history = client.session_history("sess-with-history").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);

    client.delete_session(&id).await.unwrap();
    assert!(client.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn model_endpoints() {
    let (url, _shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();

    let list = client.list_models().await.unwrap();
    assert_eq!(list.models.len(), 2);
    assert!(list.current.is_none());

    client.change_model("gemma2-9b-it").await.unwrap();
    assert_eq!(
        client.list_models().await.unwrap().current.as_deref(),
        Some("gemma2-9b-it")
    );
    assert!(matches!(
        client.change_model("gpt-17").await,
        Err(BackendError::Api(_))
    ));
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
        listener.local_addr().expect("local_addr").port()
    };
    let client = BackendClient::new(&format!("http://127.0.0.1:{}", port), None).unwrap();
    let err = client.list_documents().await.unwrap_err();
    assert!(matches!(err, BackendError::Request(_)));
    assert!(err.server_message().is_none());
}

#[tokio::test]
async fn controller_upload_scenario_over_http() {
    let (url, _shared) = start_backend().await;
    let client = BackendClient::new(&url, None).unwrap();
    let mut controller = Controller::new(client, ChatMode::Sessions, false);
    controller.start().await;
    assert!(controller.state().current_session().is_some());

    controller
        .upload(UploadFile::new("report.pdf", b"%PDF-1.4".to_vec()))
        .await;
    let entries = controller.state().transcript().entries();
    assert_eq!(
        entries.last().unwrap().body,
        EntryBody::Markdown("**report.pdf** added to the knowledge base.".into())
    );
    let names: Vec<&str> = controller.state().documents().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["report.pdf"]);

    assert!(controller.send("Summarize it").await);
    let entries = controller.state().transcript().entries();
    let answer = entries.last().unwrap();
    assert_eq!(answer.sources, vec!["q3.pdf", "notes.txt"]);
}

/// A backend whose list endpoints fail the way the server reports errors: HTTP 500 with a
/// JSON `status`/`message` body, or FastAPI's `detail`.
async fn start_failing_backend() -> (String, Arc<Mutex<usize>>) {
    let creates = Arc::new(Mutex::new(0usize));
    let counter = creates.clone();
    let app = Router::new()
        .route(
            "/sessions",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "message": "database is locked" })),
                )
            })
            .post(move || {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Json(json!({ "status": "error", "message": "session store is read-only" }))
                }
            }),
        )
        .route(
            "/documents",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "message": "index offline" })),
                )
            }),
        )
        .route(
            "/sessions/:id/history",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "detail": "Session not found" })),
                )
            }),
        )
        .route(
            "/models",
            get(|| async { Json(json!({ "status": "error", "message": "no provider key" })) }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), creates)
}

#[tokio::test]
async fn json_error_bodies_are_api_errors() {
    let (url, _creates) = start_failing_backend().await;
    let client = BackendClient::new(&url, None).unwrap();

    match client.list_sessions().await {
        Err(BackendError::Api(m)) => assert_eq!(m, "database is locked"),
        other => panic!("expected api error, got {:?}", other),
    }
    match client.list_documents().await {
        Err(BackendError::Api(m)) => assert_eq!(m, "index offline"),
        other => panic!("expected api error, got {:?}", other),
    }
    match client.session_history("gone").await {
        Err(BackendError::Api(m)) => assert_eq!(m, "Session not found"),
        other => panic!("expected api error, got {:?}", other),
    }
    match client.list_models().await {
        Err(BackendError::Api(m)) => assert_eq!(m, "no provider key"),
        other => panic!("expected api error, got {:?}", other),
    }
    match client.create_session().await {
        Err(BackendError::Api(m)) => assert_eq!(m, "session store is read-only"),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_listing_neither_creates_a_session_nor_clears_documents() {
    let (url, creates) = start_failing_backend().await;
    let client = BackendClient::new(&url, None).unwrap();
    let mut controller = Controller::new(client, ChatMode::Sessions, false);
    controller
        .state_mut()
        .apply_documents(vec![Document::new("keep.pdf")]);

    controller.start().await;

    assert_eq!(*creates.lock().unwrap(), 0);
    assert!(controller.state().current_session().is_none());
    let names: Vec<&str> = controller.state().documents().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["keep.pdf"]);
    assert!(controller
        .state()
        .notice()
        .unwrap()
        .contains("database is locked"));
}

#[tokio::test]
async fn failed_history_shows_an_error_not_the_welcome_text() {
    let (url, _creates) = start_failing_backend().await;
    let client = BackendClient::new(&url, None).unwrap();
    let mut controller = Controller::new(client, ChatMode::Sessions, false);

    controller.switch_session("gone").await;

    let entries = controller.state().transcript().entries();
    assert_eq!(entries.len(), 1);
    match &entries[0].body {
        EntryBody::Error(text) => {
            assert!(text.contains("Session not found"), "got {}", text);
            assert_ne!(text, WELCOME_TEXT);
        }
        other => panic!("expected error entry, got {:?}", other),
    }
}

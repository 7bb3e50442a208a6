//! In-process stand-ins for the gym API and for storage, shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::storage::{KeyValueStore, MemoryStore, StorageError};

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

pub(crate) struct MockState {
    requests: Mutex<Vec<Recorded>>,
    session_reply: Mutex<(StatusCode, Value)>,
    session_delay: Mutex<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            session_reply: Mutex::new((
                StatusCode::OK,
                json!({
                    "user": { "id": "1", "name": "A", "email": "a@b.com" },
                    "token": "tok1",
                }),
            )),
            session_delay: Mutex::new(Duration::ZERO),
        }
    }
}

impl MockState {
    fn record_body(&self, path: &str, body: Value) {
        let mut requests = self.requests.lock().unwrap();
        if let Some(last) = requests.iter_mut().rev().find(|r| r.path == path) {
            last.body = Some(body);
        }
    }
}

/// A gym API served from an ephemeral local port
pub(crate) struct MockApi {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/sessions", post(create_session))
            .route("/users", post(create_user).put(update_user))
            .route("/users/avatar", patch(upload_avatar))
            .route("/groups", get(groups))
            .route("/exercises/bygroup/:group", get(exercises_by_group))
            .route("/exercises/:id", get(exercise))
            .route("/history", get(history).post(log_exercise))
            .route("/broken", get(broken))
            .route("/not-json", get(not_json))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// A base URL nothing is listening on
    pub async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    pub fn set_session_reply(&self, status: StatusCode, body: Value) {
        *self.state.session_reply.lock().unwrap() = (status, body);
    }

    pub fn set_session_delay(&self, delay: Duration) {
        *self.state.session_delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// `Authorization` header of every request to `path`, in arrival order
    pub fn authorization_headers(&self, path: &str) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .map(|r| r.authorization)
            .collect()
    }

    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.path == path)
            .and_then(|r| r.body)
    }
}

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        path: request.uri().path().to_string(),
        authorization,
        body: None,
    });
    next.run(request).await
}

async fn create_session(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record_body("/sessions", body);
    let delay = *state.session_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let (status, reply) = state.session_reply.lock().unwrap().clone();
    (status, Json(reply))
}

async fn create_user(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "taken@b.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "Este e-mail já está em uso." })),
        );
    }
    state.record_body("/users", body);
    (StatusCode::CREATED, Json(json!({})))
}

async fn update_user(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> StatusCode {
    state.record_body("/users", body);
    StatusCode::OK
}

async fn upload_avatar(headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Value>) {
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);
    if !is_multipart || body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Arquivo não enviado." })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "avatar": "uploaded-avatar.png" })),
    )
}

async fn groups() -> Json<Value> {
    Json(json!(["costas", "ombro"]))
}

fn sample_exercise() -> Value {
    json!({
        "id": 1,
        "name": "Remada curvada",
        "series": 3,
        "repetitions": 12,
        "group": "costas",
        "demo": "remada_curvada.gif",
        "thumb": "remada_curvada.png",
    })
}

async fn exercises_by_group(Path(group): Path<String>) -> Json<Value> {
    if group == "costas" {
        Json(json!([sample_exercise()]))
    } else {
        Json(json!([]))
    }
}

async fn exercise(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    if id == "1" {
        (StatusCode::OK, Json(sample_exercise()))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "Exercício não encontrado." })),
        )
    }
}

async fn history() -> Json<Value> {
    Json(json!([{
        "title": "26.05.23",
        "data": [{ "id": 1, "name": "Remada curvada", "group": "costas", "hour": "08:31" }],
    }]))
}

async fn log_exercise(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> StatusCode {
    state.record_body("/history", body);
    StatusCode::CREATED
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>")
}

async fn not_json() -> &'static str {
    "definitely not json"
}

/// Memory-backed store whose operations can be made to fail on demand
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_set: AtomicBool,
    fail_get: AtomicBool,
    fail_remove: AtomicBool,
}

impl FlakyStore {
    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

fn injected(op: &str) -> StorageError {
    StorageError::Backend(format!("injected {} failure", op))
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(injected("set"));
        }
        self.inner.set_item(key, value).await
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected("get"));
        }
        self.inner.get_item(key).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(injected("remove"));
        }
        self.inner.remove_item(key).await
    }
}

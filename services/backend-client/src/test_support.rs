//! Local mock backend for endpoint tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use common::Secret;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::config::{Config, LoginTokens};
use crate::notifier::ConsoleNotifier;
use crate::session::Session;

/// Serializes tests that mutate or read environment variables, preventing
/// data races when tests run in parallel.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// `Config::load` under `ENV_MUTEX`, so env overlays set by other tests
/// cannot leak in.
pub fn load_config(path: &Path) -> Config {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    Config::load(path).unwrap()
}

pub const SERVER_ANON_ID: &str = "anon-server-1";
pub const VALID_TOKEN: &str = "at_valid";
pub const FREE_TIER_TOKEN: &str = "at_free";

#[derive(Default)]
pub struct MockState {
    refresh_calls: AtomicUsize,
    anonymous_ids: Mutex<Vec<Option<String>>>,
    issues: Mutex<Vec<Value>>,
    settings: Mutex<Value>,
}

impl MockState {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Anonymous id header of each `/synonyms` request, in arrival order.
    pub fn anonymous_ids_seen(&self) -> Vec<Option<String>> {
        self.anonymous_ids.lock().unwrap().clone()
    }

    pub fn last_issue(&self) -> Option<Value> {
        self.issues.lock().unwrap().last().cloned()
    }
}

pub struct MockBackend {
    pub state: Arc<MockState>,
    pub notifier: Arc<ConsoleNotifier>,
    base_url: String,
    dir: tempfile::TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());

        let app = axum::Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/synonyms", post(synonyms))
            .route("/folders", get(folders))
            .route("/issues", post(issues))
            .route("/settings", get(get_settings).put(put_settings))
            .route("/coupons", get(coupons))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            notifier: Arc::new(ConsoleNotifier::default()),
            base_url: format!("http://{addr}"),
            dir: tempfile::tempdir().unwrap(),
            _handle: handle,
        }
    }

    pub async fn open_session(&self) -> Session {
        let config_path = self.dir.path().join("backend-client.toml");
        std::fs::write(
            &config_path,
            format!(
                "[backend]\nbase_url = \"{}\"\ntimeout_secs = 5\n[session]\ncredentials_path = \"{}\"\n",
                self.base_url,
                self.dir.path().join("session.json").display()
            ),
        )
        .unwrap();
        let config = load_config(&config_path);
        Session::open(&config, self.notifier.clone()).await.unwrap()
    }
}

pub async fn sign_in(session: &Session, access: &str, refresh: Option<&str>) {
    session
        .login(LoginTokens {
            access_token: Secret::new(access.to_string()),
            refresh_token: refresh.map(|r| Secret::new(r.to_string())),
        })
        .await
        .unwrap();
}

fn respond(status: StatusCode, body: Value) -> Response {
    (status, [("x-anonymous-user-id", SERVER_ANON_ID)], Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Accepts the two known tokens; any other bearer is expired, none is a
/// login prompt.
fn authorize(headers: &HeaderMap) -> Result<&str, Response> {
    match bearer(headers) {
        None => Err(respond(
            StatusCode::FORBIDDEN,
            json!({"error_code": "LOGIN_REQUIRED"}),
        )),
        Some(token @ (VALID_TOKEN | FREE_TIER_TOKEN)) => Ok(token),
        Some(_) => Err(respond(
            StatusCode::UNAUTHORIZED,
            json!({"error_code": "TOKEN_EXPIRED", "detail": "access token expired"}),
        )),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body["refresh_token"] == "rt_good" {
        respond(
            StatusCode::OK,
            json!({"access_token": VALID_TOKEN, "refresh_token": "rt_next", "expires_in": 3600}),
        )
    } else {
        respond(
            StatusCode::UNAUTHORIZED,
            json!({"error_code": "INVALID_GRANT"}),
        )
    }
}

async fn synonyms(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers).is_some()
        && let Err(rejection) = authorize(&headers)
    {
        return rejection;
    }
    state.anonymous_ids.lock().unwrap().push(
        headers
            .get("x-anonymous-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    let results: Vec<Value> = body["words"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(|word| json!({"word": word, "synonyms": [format!("{word}-alt")]}))
        .collect();
    respond(StatusCode::OK, json!({ "results": results }))
}

async fn folders(headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&headers) {
        return rejection;
    }
    respond(
        StatusCode::OK,
        json!({"folders": [
            {"id": "f-1", "name": "Inbox"},
            {"id": "f-2", "name": "Work", "parent_id": "f-1"}
        ]}),
    )
}

async fn issues(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["title"].as_str().is_none_or(str::is_empty) {
        return respond(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error_code": "VALIDATION_FAILED", "error_message": "title is required"}),
        );
    }
    let mut issues = state.issues.lock().unwrap();
    issues.push(body);
    respond(
        StatusCode::CREATED,
        json!({"issue_id": format!("issue-{}", issues.len())}),
    )
}

async fn get_settings(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&headers) {
        return rejection;
    }
    let settings = state.settings.lock().unwrap().clone();
    respond(
        StatusCode::OK,
        json!({"settings": settings, "updated_at": "2026-01-01T00:00:00Z"}),
    )
}

async fn put_settings(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&headers) {
        return rejection;
    }
    *state.settings.lock().unwrap() = body["settings"].clone();
    respond(
        StatusCode::OK,
        json!({"updated_at": "2026-01-01T00:00:00Z"}),
    )
}

async fn coupons(headers: HeaderMap) -> Response {
    match authorize(&headers) {
        Err(rejection) => rejection,
        Ok(FREE_TIER_TOKEN) => respond(
            StatusCode::PAYMENT_REQUIRED,
            json!({"error_code": "SUBSCRIPTION_REQUIRED"}),
        ),
        Ok(_) => respond(
            StatusCode::OK,
            json!({"coupons": [{"code": "SPRING25", "description": "25% off"}]}),
        ),
    }
}

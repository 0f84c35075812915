//! In-process fake of the triage backend for integration tests

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use triage::{ApiClient, ClientConfig, SessionCell, SessionManager, TokenStore};

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Hit counters and failure switches shared with the handlers
#[derive(Default)]
pub struct Backend {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub message_loads: AtomicUsize,
    pub analytics_loads: AtomicUsize,
    pub stats_loads: AtomicUsize,
    pub sentiment_loads: AtomicUsize,
    pub fetches: AtomicUsize,
    /// Every bearer route answers 401
    pub revoke: AtomicBool,
    /// `/messages` answers 500
    pub fail_messages: AtomicBool,
    /// `/auth/logout` answers 500
    pub logout_fails: AtomicBool,
    /// `/predict` answers 500
    pub fail_predict: AtomicBool,
    /// `/messages`, `/messages/fetch` and `/feedback` take 300 ms
    pub slow: AtomicBool,
    pub last_feedback: Mutex<Option<Value>>,
    pub settings: Mutex<serde_json::Map<String, Value>>,
}

impl Backend {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

pub struct TestServer {
    pub base_url: String,
    pub backend: Arc<Backend>,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_backend() -> TestServer {
    let backend = Arc::new(Backend::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/google", post(google))
        .route("/auth/logout", post(logout))
        .route("/messages", get(messages))
        .route("/messages/fetch", post(fetch))
        .route("/feedback", post(feedback))
        .route("/predict", post(predict))
        .route("/dashboard/stats", get(stats))
        .route("/analytics", get(analytics))
        .route("/analytics/sentiment", get(sentiment))
        .route("/user/settings", get(get_settings).put(put_settings))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        backend,
        handle,
    }
}

/// Client stack wired the way the CLI wires it
pub struct Harness {
    pub server: TestServer,
    pub cell: Arc<SessionCell>,
    pub client: Arc<ApiClient>,
    pub sessions: Arc<SessionManager>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_store(TokenStore::in_memory()).await
    }

    pub async fn with_store(store: TokenStore) -> Self {
        let server = spawn_backend().await;
        let (cell, client, sessions) = connect(&server.base_url, store);
        sessions.restore();
        Self {
            server,
            cell,
            client,
            sessions,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.server.backend
    }
}

pub fn connect(
    base_url: &str,
    store: TokenStore,
) -> (Arc<SessionCell>, Arc<ApiClient>, Arc<SessionManager>) {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        request_timeout_ms: 5_000,
        ..Default::default()
    };
    let cell = Arc::new(SessionCell::new(store));
    let client = Arc::new(ApiClient::new(config, Arc::clone(&cell)).unwrap());
    let sessions = Arc::new(SessionManager::new(Arc::clone(&client)));
    (cell, client, sessions)
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

async fn delay(backend: &Backend) {
    if backend.slow.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}

fn fail(status: StatusCode, body: Value) -> (StatusCode, Json<Value>) {
    (status, Json(body))
}

fn authorize(backend: &Backend, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if backend.revoke.load(Ordering::SeqCst) {
        return Err(fail(StatusCode::UNAUTHORIZED, json!({ "detail": "Token expired" })));
    }
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len());
    if bearer {
        Ok(())
    } else {
        Err(fail(StatusCode::UNAUTHORIZED, json!({ "detail": "Not authenticated" })))
    }
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Reply {
    backend.logins.fetch_add(1, Ordering::SeqCst);

    match body["email"].as_str().unwrap_or_default() {
        "a@b.com" => Ok(Json(json!({
            "access_token": "T",
            "token_type": "bearer",
            "user": { "id": 1, "name": "Alice", "email": "a@b.com" }
        }))),
        "slow@x.com" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(Json(json!({
                "access_token": "SLOW",
                "user": { "name": "Slow", "email": "slow@x.com" }
            })))
        }
        "nouser@x.com" => Ok(Json(json!({ "access_token": "N" }))),
        "bad@x.com" => Err(fail(
            StatusCode::BAD_REQUEST,
            json!({ "message": "Malformed email" }),
        )),
        _ => Err(fail(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Invalid credentials" }),
        )),
    }
}

async fn register(Json(body): Json<Value>) -> Reply {
    match body["email"].as_str().unwrap_or_default() {
        "bob@x.com" => Ok(Json(json!({ "message": "Check your inbox" }))),
        "taken@x.com" => Err(fail(
            StatusCode::BAD_REQUEST,
            json!({ "message": "Email already registered" }),
        )),
        email => Ok(Json(json!({
            "access_token": "R",
            "user": { "id": "5", "name": "Server Name", "email": email }
        }))),
    }
}

async fn google() -> Reply {
    Ok(Json(json!({
        "access_token": "G",
        "user": { "id": 9, "name": "Y", "email": "y@x.com", "avatar": "https://img/y.png" }
    })))
}

async fn logout(State(backend): State<Arc<Backend>>) -> Reply {
    backend.logouts.fetch_add(1, Ordering::SeqCst);
    if backend.logout_fails.load(Ordering::SeqCst) {
        return Err(fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "logout broke" }),
        ));
    }
    Ok(Json(json!({ "ok": true })))
}

fn inbox() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "sender": "boss@corp.com",
            "subject": "Q3 numbers",
            "preview": "Need these today",
            "timestamp": "2024-05-01T09:00:00Z",
            "source": "gmail",
            "priority": "very_urgent",
            "context": "business",
            "confidence": 0.92,
            "isRead": false
        }),
        json!({
            "id": "wa-2",
            "sender": "+15550100",
            "subject": "",
            "preview": "Dinner tonight?",
            "timestamp": "2024-05-01T18:30:00Z",
            "source": "whatsapp",
            "priority": "not_important",
            "context": "personal",
            "confidence": 0.81,
            "is_read": true
        }),
    ]
}

async fn messages(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    backend.message_loads.fetch_add(1, Ordering::SeqCst);
    authorize(&backend, &headers)?;
    delay(&backend).await;
    if backend.fail_messages.load(Ordering::SeqCst) {
        return Err(fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "database down" }),
        ));
    }

    let messages: Vec<Value> = inbox()
        .into_iter()
        .filter(|m| match params.get("source") {
            Some(source) => m["source"] == source.as_str(),
            None => true,
        })
        .collect();
    Ok(Json(json!({ "messages": messages })))
}

async fn fetch(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    authorize(&backend, &headers)?;
    backend.fetches.fetch_add(1, Ordering::SeqCst);
    delay(&backend).await;
    Ok(Json(json!({ "success": true, "message": "Collected", "count": 2 })))
}

async fn feedback(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    authorize(&backend, &headers)?;
    delay(&backend).await;
    *backend.last_feedback.lock().unwrap() = Some(body);
    Ok(Json(json!({ "status": "recorded" })))
}

async fn predict(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    authorize(&backend, &headers)?;
    if backend.fail_predict.load(Ordering::SeqCst) {
        return Err(fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "model offline" }),
        ));
    }
    Ok(Json(json!({ "priority": "important", "context": "business", "confidence": 0.75 })))
}

async fn stats(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    backend.stats_loads.fetch_add(1, Ordering::SeqCst);
    authorize(&backend, &headers)?;
    Ok(Json(json!({ "total_messages": 2, "urgent": 1, "accuracy": 0.5 })))
}

async fn analytics(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    backend.analytics_loads.fetch_add(1, Ordering::SeqCst);
    authorize(&backend, &headers)?;
    Ok(Json(json!({
        "contextData": [{ "name": "Business", "value": 60, "color": "#2563eb" }],
        "messageVolumeData": [{ "name": "Mon", "messages": 2 }],
        "totalMessages": 2,
        "urgentMessages": 1,
        "accuracyRate": 0.5
    })))
}

async fn sentiment(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    backend.sentiment_loads.fetch_add(1, Ordering::SeqCst);
    authorize(&backend, &headers)?;
    Ok(Json(json!([{ "date": "2024-05-01", "positive": 3, "negative": 1 }])))
}

async fn get_settings(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    authorize(&backend, &headers)?;
    let settings = backend.settings.lock().unwrap().clone();
    Ok(Json(Value::Object(settings)))
}

async fn put_settings(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Map<String, Value>>,
) -> Reply {
    authorize(&backend, &headers)?;
    let mut settings = backend.settings.lock().unwrap();
    settings.extend(body);
    Ok(Json(Value::Object(settings.clone())))
}

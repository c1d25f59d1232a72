//! In-process stand-in for the hh.ru API, served on an ephemeral port.
//!
//! Mirrors the behaviour the client depends on: form-encoded grants on
//! `/token`, bearer revocation, `oauth`-typed 403 bodies for bad tokens and
//! business 403s from `POST /negotiations`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

use crate::api::USER_AGENT_HEADER;
use crate::config::AppConfig;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const USER_AGENT: &str = "hhlink-test/1.0 (test@example.com)";
pub const USER_EMAIL: &str = "applicant@example.com";
pub const EXPIRES_IN: i64 = 1_209_600;

const RESUME_IDS: [&str; 3] = ["r-3", "r-1", "r-2"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    App,
    User,
}

#[derive(Debug, Clone)]
struct AccessEntry {
    kind: TokenKind,
    revoked: bool,
    expired: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub path: String,
    pub user_agent: Option<String>,
    pub query: HashMap<String, String>,
}

#[derive(Default)]
struct FakeState {
    counter: u64,
    codes: HashSet<String>,
    access: HashMap<String, AccessEntry>,
    /// refresh token -> still usable
    refresh: HashMap<String, bool>,
    token_requests: usize,
    applied: HashSet<(String, String)>,
    last_request: SeenRequest,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}-{}", prefix, self.counter)
    }

    fn issue_pair(&mut self) -> (String, String) {
        let access = self.next_id("access");
        let refresh = self.next_id("refresh");
        self.access.insert(
            access.clone(),
            AccessEntry {
                kind: TokenKind::User,
                revoked: false,
                expired: false,
            },
        );
        self.refresh.insert(refresh.clone(), true);
        (access, refresh)
    }

    fn record(&mut self, path: String, headers: &HeaderMap, query: &HashMap<String, String>) {
        self.last_request = SeenRequest {
            path,
            user_agent: headers
                .get(USER_AGENT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            query: query.clone(),
        };
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<TokenKind, Response> {
        let Some(token) = bearer(headers) else {
            return Err(StatusCode::UNAUTHORIZED.into_response());
        };
        match self.access.get(&token) {
            None => Err(oauth_error("bad_authorization")),
            Some(entry) if entry.revoked => Err(oauth_error("token_revoked")),
            Some(entry) if entry.expired => Err(oauth_error("token_expired")),
            Some(entry) => Ok(entry.kind),
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakePlatform {
    base_url: Url,
    state: Shared,
}

impl FakePlatform {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let router = Router::new()
            .route("/token", post(token).delete(revoke))
            .route("/me", get(me))
            .route("/resumes/mine", get(resumes))
            .route("/resumes/{id}/similar_vacancies", get(similar_vacancies))
            .route("/negotiations", get(negotiations).post(apply))
            .route("/negotiations/{id}/messages", get(messages))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{}", addr)).unwrap(),
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            user_agent: USER_AGENT.to_string(),
            api_base_url: self.base_url.clone(),
            ..Default::default()
        }
    }

    /// Register a one-time authorization code.
    pub fn add_code(&self, code: &str) {
        self.lock().codes.insert(code.to_string());
    }

    /// Issue a user token pair without going through `/token`.
    pub fn issue_user_tokens(&self) -> (String, String) {
        self.lock().issue_pair()
    }

    pub fn issue_user_token(&self) -> String {
        self.issue_user_tokens().0
    }

    pub fn expire_access(&self, token: &str) {
        if let Some(entry) = self.lock().access.get_mut(token) {
            entry.expired = true;
        }
    }

    pub fn kill_refresh(&self, token: &str) {
        self.lock().refresh.insert(token.to_string(), false);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.lock().access.get(token).is_some_and(|e| e.revoked)
    }

    pub fn token_requests(&self) -> usize {
        self.lock().token_requests
    }

    pub fn last_request(&self) -> SeenRequest {
        self.lock().last_request.clone()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn oauth_error(value: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"errors": [{"type": "oauth", "value": value}]})),
    )
        .into_response()
}

fn grant_error(error: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": error}))).into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errors": [{"type": "not_found"}]})),
    )
        .into_response()
}

fn token_pair_body(access: String, refresh: String) -> Response {
    Json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": EXPIRES_IN,
        "token_type": "bearer",
    }))
    .into_response()
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut s = state.lock().unwrap();
    s.token_requests += 1;

    let field = |key: &str| form.get(key).map(String::as_str);
    let client_ok =
        field("client_id") == Some(CLIENT_ID) && field("client_secret") == Some(CLIENT_SECRET);

    match field("grant_type") {
        Some("client_credentials") => {
            if !client_ok {
                return grant_error("invalid_client");
            }
            let token = s.next_id("app");
            s.access.insert(
                token.clone(),
                AccessEntry {
                    kind: TokenKind::App,
                    revoked: false,
                    expired: false,
                },
            );
            Json(json!({"access_token": token, "token_type": "bearer"})).into_response()
        }
        Some("authorization_code") => {
            if !client_ok {
                return grant_error("invalid_client");
            }
            let code = field("code").unwrap_or_default();
            if !s.codes.remove(code) {
                return grant_error("invalid_grant");
            }
            let (access, refresh) = s.issue_pair();
            token_pair_body(access, refresh)
        }
        Some("refresh_token") => {
            let old = field("refresh_token").unwrap_or_default().to_string();
            if s.refresh.get(&old) != Some(&true) {
                return grant_error("invalid_grant");
            }
            s.refresh.insert(old, false);
            let (access, refresh) = s.issue_pair();
            token_pair_body(access, refresh)
        }
        _ => grant_error("unsupported_grant_type"),
    }
}

async fn revoke(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut s = state.lock().unwrap();
    let Some(token) = bearer(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match s.access.get_mut(&token) {
        None => oauth_error("bad_authorization"),
        Some(entry) if entry.revoked => oauth_error("token_revoked"),
        Some(entry) => {
            entry.revoked = true;
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

async fn me(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record("/me".into(), &headers, &query);
    match s.authorize(&headers) {
        Ok(TokenKind::App) => Json(json!({"auth_type": "application", "name": "hhlink"})).into_response(),
        Ok(TokenKind::User) => Json(json!({
            "id": "u-1",
            "email": USER_EMAIL,
            "first_name": "Ivan",
            "last_name": "Petrov",
            "is_applicant": true,
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn resumes(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record("/resumes/mine".into(), &headers, &query);
    if let Err(response) = s.authorize(&headers) {
        return response;
    }
    let items: Vec<Value> = RESUME_IDS
        .iter()
        .map(|id| json!({"id": id, "title": format!("Resume {}", id)}))
        .collect();
    Json(json!({"found": items.len(), "items": items})).into_response()
}

async fn similar_vacancies(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record(format!("/resumes/{}/similar_vacancies", id), &headers, &query);
    if let Err(response) = s.authorize(&headers) {
        return response;
    }
    if !RESUME_IDS.contains(&id.as_str()) {
        return not_found();
    }
    Json(json!({
        "found": 1,
        "items": [{"id": "v-100", "name": "Rust backend engineer"}],
        "query": query,
    }))
    .into_response()
}

async fn negotiations(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record("/negotiations".into(), &headers, &query);
    if let Err(response) = s.authorize(&headers) {
        return response;
    }
    Json(json!({
        "found": 1,
        "items": [{"id": "n-1", "state": {"id": "response"}}],
        "query": query,
    }))
    .into_response()
}

async fn apply(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record("/negotiations".into(), &headers, &query);
    if let Err(response) = s.authorize(&headers) {
        return response;
    }

    let resume_id = form.get("resume_id").cloned().unwrap_or_default();
    let vacancy_id = form.get("vacancy_id").cloned().unwrap_or_default();
    let refusal = |value: &str| {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"errors": [{"type": "negotiations", "value": value}]})),
        )
            .into_response()
    };

    if vacancy_id == "v-archived" {
        return refusal("vacancy_archived");
    }
    if !s.applied.insert((resume_id, vacancy_id.clone())) {
        return refusal("already_applied");
    }
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/negotiations/nid-{}", vacancy_id))],
    )
        .into_response()
}

async fn messages(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    s.record(format!("/negotiations/{}/messages", id), &headers, &query);
    if let Err(response) = s.authorize(&headers) {
        return response;
    }
    if id != "n-1" {
        return not_found();
    }
    Json(json!({
        "items": [{"id": "m-1", "text": "Здравствуйте!"}],
        "with_text_only": query.get("with_text_only"),
    }))
    .into_response()
}

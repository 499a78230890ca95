//! Test utilities for integration tests.
//!
//! This module provides an in-process fake of the blog API, served by axum on
//! a loopback port, plus helpers for building clients against it. Every
//! request the fake receives is recorded so tests can check what the pipeline
//! actually put on the wire.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use blog_client::session::{Fingerprint, SessionIdentity, SessionStore};
use blog_client::storage::{KeyValueStore, MemoryStore};
use blog_client::ApiClient;

/// Password the fake accepts for every account.
pub const PASSWORD: &str = "secret";

/// Email that logs in with the admin role.
pub const ADMIN_EMAIL: &str = "admin@blog.test";

/// Email that logs in with the plain user role.
pub const USER_EMAIL: &str = "reader@blog.test";

// =============================================================================
// Fake Blog Backend
// =============================================================================

/// One request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub session_id: Option<String>,
    pub content_type: Option<String>,
}

/// A multipart edit as parsed by the fake backend.
#[derive(Debug, Clone, Default)]
pub struct RecordedForm {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

/// The file part of a multipart edit.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct LikeEntry {
    base: u64,
    sessions: HashSet<String>,
}

impl LikeEntry {
    fn status(&self, session: &str) -> Value {
        json!({
            "liked": self.sessions.contains(session),
            "likesCount": self.base + self.sessions.len() as u64,
        })
    }
}

#[derive(Default)]
struct FakeBlogState {
    requests: Mutex<Vec<RecordedRequest>>,
    tokens: Mutex<HashMap<String, Value>>,
    likes: Mutex<HashMap<String, LikeEntry>>,
    forms: Mutex<Vec<RecordedForm>>,
    fail_likes: AtomicBool,
    like_delay_ms: AtomicU64,
    terse_mutations: AtomicBool,
}

/// Handle to a running fake backend.
#[derive(Clone)]
pub struct FakeBlog {
    base_url: String,
    state: Arc<FakeBlogState>,
}

impl FakeBlog {
    /// Bind a loopback port and serve the fake API on it.
    pub async fn start() -> Self {
        let state = Arc::new(FakeBlogState::default());
        {
            let mut likes = state.likes.lock().unwrap();
            likes.insert(
                "post:p1".to_string(),
                LikeEntry {
                    base: 5,
                    ..Default::default()
                },
            );
            likes.insert(
                "comment:c1".to_string(),
                LikeEntry {
                    base: 2,
                    ..Default::default()
                },
            );
        }

        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/me", get(me))
            .route("/api/posts", get(list_posts))
            .route(
                "/api/posts/{id}",
                get(get_post).put(update_post).delete(delete_post),
            )
            .route(
                "/api/posts/{id}/comments",
                get(list_comments).post(add_comment),
            )
            .route("/api/posts/{id}/like-status", get(post_like_status))
            .route("/api/posts/{id}/like", post(post_like))
            .route("/api/comments/{id}/like-status", get(comment_like_status))
            .route("/api/comments/{id}/like", post(comment_like))
            .route("/api/admin/dashboard", get(dashboard))
            .route("/api/admin/posts", get(admin_posts).post(create_post))
            .route("/api/admin/posts/{id}/publish", patch(publish))
            .route("/uploads/{file}", get(upload))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests received for one path.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Invalidate every issued token, as if the server's secret rotated.
    pub fn revoke_tokens(&self) {
        self.state.tokens.lock().unwrap().clear();
    }

    /// Multipart edits received so far.
    pub fn forms(&self) -> Vec<RecordedForm> {
        self.state.forms.lock().unwrap().clone()
    }

    /// Make create, update and comment calls answer with only `{ "message" }`.
    pub fn terse_mutations(&self, terse: bool) {
        self.state.terse_mutations.store(terse, Ordering::SeqCst);
    }

    /// Make like toggles answer 500.
    pub fn fail_likes(&self, fail: bool) {
        self.state.fail_likes.store(fail, Ordering::SeqCst);
    }

    /// Hold like toggles for `delay` before answering.
    pub fn delay_likes(&self, delay: Duration) {
        self.state
            .like_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Server-side like count for `key` (`post:<id>` or `comment:<id>`).
    pub fn like_count(&self, key: &str) -> u64 {
        let likes = self.state.likes.lock().unwrap();
        likes
            .get(key)
            .map(|entry| entry.base + entry.sessions.len() as u64)
            .unwrap_or(0)
    }
}

async fn record(State(state): State<Arc<FakeBlogState>>, request: Request, next: Next) -> Response {
    let recorded = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            authorization: header("authorization"),
            session_id: header("x-session-id"),
            content_type: header("content-type"),
        }
    };
    state.requests.lock().unwrap().push(recorded);
    next.run(request).await
}

// =============================================================================
// Handlers
// =============================================================================

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn session_of(headers: &HeaderMap) -> String {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The user behind the bearer token, or the 401 the real backend would send.
fn authenticate(state: &FakeBlogState, headers: &HeaderMap) -> Result<Value, Response> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "No token, authorization denied"))?;

    state
        .tokens
        .lock()
        .unwrap()
        .get(token)
        .cloned()
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Token is not valid"))
}

fn require_admin(state: &FakeBlogState, headers: &HeaderMap) -> Result<Value, Response> {
    let user = authenticate(state, headers)?;
    if user["role"] == "admin" {
        Ok(user)
    } else {
        Err(error(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

fn issue_token(state: &FakeBlogState, username: &str, email: &str) -> Value {
    let role = if email == ADMIN_EMAIL { "admin" } else { "user" };
    let user = json!({
        "_id": format!("u-{}", username),
        "username": username,
        "email": email,
        "role": role,
    });
    let token = format!("token-{}-{}", username, state.tokens.lock().unwrap().len());
    state
        .tokens
        .lock()
        .unwrap()
        .insert(token.clone(), user.clone());
    json!({ "token": token, "user": user })
}

async fn login(State(state): State<Arc<FakeBlogState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if body["password"] != PASSWORD {
        return error(StatusCode::BAD_REQUEST, "Invalid credentials");
    }
    let username = email.split('@').next().unwrap_or_default().to_string();
    Json(issue_token(&state, &username, email)).into_response()
}

async fn register(State(state): State<Arc<FakeBlogState>>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let email = body["email"].as_str().unwrap_or_default();
    if username.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Username is required");
    }
    (StatusCode::CREATED, Json(issue_token(&state, username, email))).into_response()
}

async fn me(State(state): State<Arc<FakeBlogState>>, headers: HeaderMap) -> Response {
    match authenticate(&state, &headers) {
        Ok(user) => Json(json!({ "user": user })).into_response(),
        Err(response) => response,
    }
}

fn post_json(id: &str, title: &str, published: bool) -> Value {
    json!({
        "_id": id,
        "title": title,
        "content": format!("<p>{}</p>", title),
        "excerpt": title,
        "category": "Technology",
        "tags": ["rust"],
        "featuredImage": "uploads\\cover.png",
        "published": published,
        "author": { "_id": "u-admin", "username": "admin" },
        "likesCount": 5,
        "commentsCount": 1,
    })
}

async fn list_posts() -> Response {
    Json(json!({
        "posts": [post_json("p1", "First post", true), post_json("p2", "Second post", true)],
        "pagination": {
            "currentPage": 1,
            "totalPages": 1,
            "totalPosts": 2,
            "hasNext": false,
            "hasPrev": false,
        },
        "sidebar": {
            "categories": [{ "_id": "Technology", "count": 2 }],
            "popularTags": [{ "_id": "rust", "count": 2 }],
        },
    }))
    .into_response()
}

async fn get_post(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return error(StatusCode::NOT_FOUND, "Post not found");
    }
    Json(json!({
        "post": post_json(&id, "First post", true),
        "relatedPosts": [post_json("p2", "Second post", true)],
    }))
    .into_response()
}

/// Success body for a mutation, trimmed to the message when terse.
fn saved(state: &FakeBlogState, message: &str, key: &str, record: Value) -> Value {
    if state.terse_mutations.load(Ordering::SeqCst) {
        json!({ "message": message })
    } else {
        json!({ "message": message, key: record })
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

async fn read_form(request: Request) -> Result<RecordedForm, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut form = RecordedForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(IntoResponse::into_response)?;
                form.image = Some(UploadedImage {
                    field: name,
                    file_name: Some(file_name),
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let value = field.text().await.map_err(IntoResponse::into_response)?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

/// Accepts the JSON draft body or the multipart edit form.
async fn update_post(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let (title, published) = if is_multipart(&headers) {
        let form = match read_form(request).await {
            Ok(form) => form,
            Err(response) => return response,
        };
        let title = form.fields.get("title").cloned().unwrap_or_default();
        let published = form.fields.get("published").is_some_and(|v| v == "true");
        state.forms.lock().unwrap().push(form);
        (title, published)
    } else {
        let Json(body) = match Json::<Value>::from_request(request, &()).await {
            Ok(body) => body,
            Err(rejection) => return rejection.into_response(),
        };
        let title = body["title"].as_str().unwrap_or_default().to_string();
        (title, body["status"] == "published")
    };

    Json(saved(
        &state,
        "Post updated successfully",
        "post",
        post_json(&id, &title, published),
    ))
    .into_response()
}

async fn delete_post(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    match require_admin(&state, &headers) {
        Ok(_) => Json(json!({ "message": "Post deleted successfully" })).into_response(),
        Err(response) => response,
    }
}

async fn list_comments(Path(_id): Path<String>) -> Response {
    Json(json!({
        "comments": [{
            "_id": "c1",
            "username": "bob",
            "text": "Nice post",
            "likesCount": 2,
            "replies": [],
        }],
    }))
    .into_response()
}

async fn add_comment(
    State(state): State<Arc<FakeBlogState>>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if body["text"].as_str().unwrap_or_default().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Comment text is required");
    }
    let comment = json!({
        "_id": "c2",
        "username": body["username"],
        "text": body["text"],
    });
    (
        StatusCode::CREATED,
        Json(saved(&state, "Comment added", "comment", comment)),
    )
        .into_response()
}

fn like_status(state: &FakeBlogState, key: String, headers: &HeaderMap) -> Response {
    let session = session_of(headers);
    let mut likes = state.likes.lock().unwrap();
    Json(likes.entry(key).or_default().status(&session)).into_response()
}

async fn toggle_like(state: &FakeBlogState, key: String, headers: &HeaderMap) -> Response {
    let delay = state.like_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail_likes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
    }

    let session = session_of(headers);
    let mut likes = state.likes.lock().unwrap();
    let entry = likes.entry(key).or_default();
    if !entry.sessions.remove(&session) {
        entry.sessions.insert(session.clone());
    }
    Json(entry.status(&session)).into_response()
}

async fn post_like_status(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    like_status(&state, format!("post:{}", id), &headers)
}

async fn post_like(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    toggle_like(&state, format!("post:{}", id), &headers).await
}

async fn comment_like_status(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    like_status(&state, format!("comment:{}", id), &headers)
}

async fn comment_like(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    toggle_like(&state, format!("comment:{}", id), &headers).await
}

async fn dashboard(State(state): State<Arc<FakeBlogState>>, headers: HeaderMap) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    Json(json!({
        "totalPosts": 2,
        "publishedPosts": 1,
        "draftPosts": 1,
        "totalComments": 1,
        "totalViews": 42,
        "recentPosts": [post_json("p1", "First post", true)],
    }))
    .into_response()
}

async fn admin_posts(State(state): State<Arc<FakeBlogState>>, headers: HeaderMap) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    Json(json!({
        "posts": [post_json("p1", "First post", true), post_json("p3", "Draft", false)],
        "pagination": { "currentPage": 1, "totalPages": 1, "totalPosts": 2 },
    }))
    .into_response()
}

async fn create_post(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    let title = body["title"].as_str().unwrap_or_default();
    let published = body["status"] == "published";
    (
        StatusCode::CREATED,
        Json(saved(
            &state,
            "Post created successfully",
            "post",
            post_json("p9", title, published),
        )),
    )
        .into_response()
}

async fn publish(
    State(state): State<Arc<FakeBlogState>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    match require_admin(&state, &headers) {
        Ok(_) => Json(json!({ "message": "Post published successfully" })).into_response(),
        Err(response) => response,
    }
}

async fn upload(Path(file): Path<String>) -> Response {
    if file == "cover.png" {
        ([("content-type", "image/png")], vec![0x89, b'P', b'N', b'G']).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

// =============================================================================
// Client Helpers
// =============================================================================

/// Fixed fingerprint so identifiers are comparable across runs.
pub fn test_fingerprint() -> Fingerprint {
    Fingerprint {
        user_agent: "integration-tests".to_string(),
        locale: "en-US".to_string(),
        screen_width: 1280,
        screen_height: 720,
    }
}

/// A client whose token and session id live in `storage`.
pub fn client_with_store(base_url: &str, storage: Arc<dyn KeyValueStore>) -> ApiClient {
    let identity = Arc::new(SessionIdentity::with_fingerprint(
        storage.clone(),
        test_fingerprint(),
    ));
    ApiClient::new(base_url, SessionStore::new(storage), identity).unwrap()
}

/// A client with fresh in-memory storage.
pub fn memory_client(base_url: &str) -> ApiClient {
    client_with_store(base_url, Arc::new(MemoryStore::new()))
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Wait until `condition` holds, polling for up to a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

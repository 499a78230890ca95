//! Request pipeline: the single choke point for calls to the blog API.
//!
//! # Outbound
//!
//! Every request built through [`ApiClient`] carries:
//!
//! ```text
//! Content-Type:  application/json  (multipart/form-data for form bodies)
//! Authorization: Bearer <token>     (only when a token is persisted)
//! X-Session-ID:  <session id>       (always)
//! ```
//!
//! # Inbound
//!
//! | Response | Effect |
//! |----------|--------|
//! | 2xx | Body decoded and returned |
//! | 401 | Token cleared, [`AuthEvent::Expired`] broadcast, `ApiError::Unauthorized` returned |
//! | other | `ApiError::Status` returned untouched |
//! | transport | `ApiError::Timeout` / `ApiError::Network` returned |
//!
//! The pipeline never navigates. Whatever sits on top (a CLI, a UI shell)
//! subscribes to [`ApiClient::subscribe`] and decides what "go to login"
//! means for it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{ApiError, ConfigError};
use crate::session::{SessionIdentity, SessionStore};

/// Header carrying the client-generated session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

/// Capacity of the auth event channel. Slow subscribers only ever miss
/// duplicate expiry notices.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Longest server error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

/// Session-level events emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A request was answered with 401; the token has already been cleared.
    Expired {
        /// Path of the request that triggered the expiry.
        path: String,
    },
}

// =============================================================================
// Request Envelope
// =============================================================================

/// One outbound call: method, path, optional query and body.
///
/// Headers are not part of the envelope; the pipeline attaches them when the
/// request is dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// What an [`ApiRequest`] carries on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`
    Json(serde_json::Value),
    /// `multipart/form-data`
    Form(FormBody),
}

/// Text fields plus at most one file, sent as `multipart/form-data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormBody {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

/// A file attached to a [`FormBody`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Form field the file is sent under.
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FormBody {
    /// Build the reqwest form. Fails only on an unparseable content type.
    fn into_form(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        if let Some(file) = self.file {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| {
                    ApiError::Encode(format!(
                        "invalid content type '{}': {}",
                        file.content_type, e
                    ))
                })?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Attach a multipart form body.
    pub fn form(mut self, form: FormBody) -> Self {
        self.body = Some(RequestBody::Form(form));
        self
    }

    /// Append query parameters.
    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }
}

// =============================================================================
// API Client
// =============================================================================

struct Inner {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    identity: Arc<SessionIdentity>,
    events: broadcast::Sender<AuthEvent>,
}

/// Authenticated client for the blog API.
///
/// Cheap to clone; clones share the HTTP connection pool, the session state
/// and the event channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client with the default 10 second request timeout.
    pub fn new(
        base_url: &str,
        session: SessionStore,
        identity: Arc<SessionIdentity>,
    ) -> Result<Self, ConfigError> {
        Self::with_timeout(base_url, session, identity, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        session: SessionStore,
        identity: Arc<SessionIdentity>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base_url = validate_base_url(base_url)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                session,
                identity,
                events,
            }),
        })
    }

    /// The validated base address, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Session state consulted on every request.
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// The session identity provider.
    pub fn identity(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    /// Underlying HTTP client, for requests that must not be decorated
    /// (e.g. probing third-party image hosts).
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Subscribe to session-level events such as token expiry.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }

    /// The auth and session headers the next request will carry.
    pub fn decoration_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(token) = self.inner.session.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Persisted token is not a valid header value, omitting it"),
            }
        }

        let session_id = self.inner.identity.session_id();
        match HeaderValue::from_str(&session_id) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(SESSION_HEADER), value);
            }
            Err(_) => warn!(session_id = %session_id, "Session id is not a valid header value"),
        }

        headers
    }

    /// Send a request and decode the JSON response body.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let body = self.dispatch(request).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Send a request whose response body is irrelevant.
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.dispatch(request).await.map(|_| ())
    }

    /// Send a request and return the raw response body.
    ///
    /// JSON and form bodies take the same path: both get the auth and
    /// session headers, and both trigger the 401 teardown.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<Bytes, ApiError> {
        let ApiRequest {
            method,
            path,
            query,
            body,
        } = request;
        let url = self.url(&path);
        let started = Instant::now();

        let mut builder = self
            .inner
            .http
            .request(method.clone(), &url)
            .headers(self.decoration_headers());
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        match body {
            Some(RequestBody::Json(value)) => builder = builder.json(&value),
            // Sets its own multipart Content-Type, which wins over the default.
            Some(RequestBody::Form(form)) => builder = builder.multipart(form.into_form()?),
            None => {}
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = ApiError::from(e);
                debug!(
                    method = %method,
                    path = %path,
                    error = %err,
                    "Request failed before a response arrived"
                );
                return Err(err);
            }
        };

        let status = response.status();
        debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API request completed"
        );

        if status == StatusCode::UNAUTHORIZED {
            self.expire_session(&path);
            return Err(ApiError::Unauthorized { path });
        }

        let body = response.bytes().await.map_err(ApiError::from)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    /// Global reaction to a 401: single teardown, then notify subscribers.
    fn expire_session(&self, path: &str) {
        let had_token = self.inner.session.clear_token();
        warn!(
            path = %path,
            had_token = had_token,
            "Authentication failed, session cleared"
        );
        // No subscribers is fine; the token is gone either way.
        let _ = self.inner.events.send(AuthEvent::Expired {
            path: path.to_string(),
        });
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("session", &self.inner.session)
            .finish()
    }
}

/// Reject empty, relative and non-http bases.
fn validate_base_url(base_url: &str) -> Result<String, ConfigError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::RelativeBaseUrl(base_url.to_string()));
    }

    let parsed = Url::parse(trimmed).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            ConfigError::RelativeBaseUrl(base_url.to_string())
        }
        other => ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: other.to_string(),
        },
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

/// Pull a human-readable message out of an error body.
///
/// The server answers `{ "message": "..." }`; anything else is echoed
/// (truncated) as text.
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

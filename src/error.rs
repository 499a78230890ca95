use http::StatusCode;
use thiserror::Error;

/// Errors raised by client-local persistent storage
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Persisted state could not be encoded or decoded
    #[error("Storage serialization error: {0}")]
    Serialization(String),

    /// The backend cannot be used at all (e.g. no data directory)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors returned by calls through the request pipeline
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server rejected the credentials (HTTP 401).
    ///
    /// By the time a caller sees this, the persisted token is already gone.
    #[error("Authentication required: {path}")]
    Unauthorized { path: String },

    /// Any other non-success HTTP status
    #[error("Request failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset, etc.
    #[error("Network error: {0}")]
    Network(String),

    /// The request body or form could not be built
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// The response body was not the JSON shape we expected
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request URL could not be built from the base and path
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status carried by this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened below the HTTP layer.
    ///
    /// Nothing in this crate retries; callers that want to can key off this.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout(_) | ApiError::Network(_))
    }

    /// The message a caller would show to a user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Unauthorized { .. } => "Your session has expired. Please log in again.".into(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidUrl(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Errors detected while turning configuration into a working client
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The resolved base address is empty or relative; a native client has
    /// no document origin to resolve it against.
    #[error("API base URL '{0}' is relative; set --api-url or BLOG_API_URL")]
    RelativeBaseUrl(String),

    /// The base address is not a valid http(s) URL
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Errors from login, registration and session restore
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The API call itself failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The token was issued but could not be persisted
    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

//! # Blog Client
//!
//! Client library for a simple blog platform's REST API.
//!
//! This crate is the part of a blog front end that is not presentation: it
//! owns the authenticated request pipeline, the per-profile session
//! identifier, the auth session and the optimistic like/unlike interaction.
//! Rendering and routing live in whatever sits on top of it.
//!
//! ## Features
//!
//! - **Single request pipeline**: bearer token and `X-Session-ID` attached to
//!   every call; a 401 anywhere clears the token and broadcasts an event
//! - **Stable session identity**: generated once per storage profile
//! - **Optimistic likes**: one controller for posts and comments, with
//!   debounce, server reconciliation and rollback
//! - **Pluggable storage**: in-memory or JSON file
//!
//! ## Architecture
//!
//! - [`storage`] - client-local key/value persistence
//! - [`session`] - session identity, token store and auth session
//! - [`api`] - request pipeline, wire models and typed endpoints
//! - [`interaction`] - optimistic like controller
//! - [`image`] - image reference resolution
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blog_client::{ApiClient, ApiLikeTarget, LikeController, MemoryStore, SessionIdentity, SessionStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(MemoryStore::new());
//!     let identity = Arc::new(SessionIdentity::new(storage.clone()));
//!     let client = ApiClient::new("http://localhost:5000", SessionStore::new(storage), identity)
//!         .expect("valid base url");
//!
//!     let likes = LikeController::new(ApiLikeTarget::post(client, "42"), Default::default());
//!     let _ = likes.mount().await;
//!     let outcome = likes.toggle().await;
//!     println!("{:?} -> {:?}", outcome, likes.state());
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod image;
pub mod interaction;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use api::{
    ApiClient, ApiRequest, AuthEvent, Comment, CommentSaved, Credentials, ImageUpload, LikeKind,
    LikeStatus, NewComment, Post, PostDraft, PostEdit, PostQuery, PostSaved, Registration, User,
    SESSION_HEADER,
};
pub use config::{
    resolve_base_url, BuildProfile, Cli, Command, Config, DEFAULT_REQUEST_TIMEOUT,
    DEVELOPMENT_API_URL,
};
pub use error::{ApiError, AuthError, ConfigError, StorageError};
pub use image::{placeholder_data_uri, ImageResolver};
pub use interaction::{
    ApiLikeTarget, IgnoreReason, LikeController, LikeTarget, ToggleOutcome, DEBOUNCE_INTERVAL,
};
pub use session::{AuthSession, Fingerprint, SessionIdentity, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

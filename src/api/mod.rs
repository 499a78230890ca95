//! Blog API access.
//!
//! - [`pipeline`] - the authenticated request pipeline ([`ApiClient`])
//! - [`models`] - wire types
//! - `endpoints` - typed resource calls implemented on [`ApiClient`]

mod endpoints;
pub mod models;
pub mod pipeline;

pub use endpoints::{LikeKind, FEATURED_IMAGE_FIELD};
pub use models::{
    AuthResponse, Comment, CommentSaved, Credentials, DashboardStats, ImageUpload, LikeStatus,
    NewComment, Post, PostDetail, PostDraft, PostEdit, PostList, PostQuery, PostSaved,
    Registration, User,
};
pub use pipeline::{
    ApiClient, ApiRequest, AuthEvent, FilePart, FormBody, RequestBody, SESSION_HEADER,
};

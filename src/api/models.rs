//! Wire types of the blog API.
//!
//! The server speaks camelCase JSON and uses `_id` for identifiers. Fields the
//! server may omit are defaulted so partial payloads still decode.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Role string the server uses for administrators.
pub const ADMIN_ROLE: &str = "admin";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Issued by login and registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Response of `GET /api/auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub user: User,
}

/// Author summary embedded in posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub read_time: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Pagination block of a post listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_posts: u64,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

/// Category with post count, shown in the listing sidebar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryCount {
    #[serde(alias = "_id")]
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sidebar {
    #[serde(default)]
    pub categories: Vec<CategoryCount>,
    #[serde(default)]
    pub popular_tags: Vec<CategoryCount>,
}

/// Response of `GET /api/posts` and `GET /api/admin/posts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostList {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub sidebar: Sidebar,
}

/// Response of `GET /api/posts/:id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub post: Post,
    #[serde(default)]
    pub related_posts: Vec<Post>,
}

/// Query parameters of the post listings.
///
/// Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub status: Option<String>,
}

impl PostQuery {
    /// Flatten into `(key, value)` pairs for the request envelope.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        let text = [
            ("search", &self.search),
            ("category", &self.category),
            ("sort", &self.sort),
            ("status", &self.status),
        ];
        for (key, value) in text {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
        pairs
    }
}

/// Body for creating or updating a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    /// `"published"` or `"draft"`.
    pub status: String,
    pub featured_image: Option<String>,
}

/// Fields of the multipart edit form for `PUT /api/posts/:id`.
///
/// Tags travel as one comma-separated field and `published` as
/// `"true"`/`"false"`, matching what the backend's form parser expects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostEdit {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    pub meta_description: Option<String>,
    pub published: bool,
}

impl PostEdit {
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("title".into(), self.title.clone()),
            ("content".into(), self.content.clone()),
            ("excerpt".into(), self.excerpt.clone()),
            ("category".into(), self.category.clone()),
            ("tags".into(), self.tags.join(", ")),
            (
                "metaDescription".into(),
                self.meta_description.clone().unwrap_or_default(),
            ),
            ("published".into(), self.published.to_string()),
        ]
    }
}

/// A featured image uploaded alongside a post edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// Wrap file contents, guessing the content type from the extension.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = image_content_type(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }
}

fn image_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Response of a post mutation.
///
/// Some deployments answer with only `{ "message": ... }`; `post` is then
/// `None` and the mutation still counts as a success.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostSaved {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub post: Option<Post>,
}

/// Response of `POST /api/posts/:id/comments`; `comment` may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentSaved {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub comment: Option<Comment>,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    pub text: String,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub replies: Vec<serde_json::Value>,
}

/// Response of `GET /api/posts/:id/comments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Body of `POST /api/posts/:id/comments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub text: String,
    pub username: String,
    pub email: String,
}

/// Authoritative like state of a post or comment, as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub liked: bool,
    #[serde(default)]
    pub likes_count: u64,
}

/// Response of `GET /api/admin/dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub total_posts: u64,
    #[serde(default)]
    pub published_posts: u64,
    #[serde(default)]
    pub draft_posts: u64,
    #[serde(default)]
    pub total_comments: u64,
    #[serde(default)]
    pub total_views: u64,
    #[serde(default)]
    pub recent_posts: Vec<Post>,
}

/// Server message returned by mutations that have no other payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message: String,
}

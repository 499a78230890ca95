use async_trait::async_trait;

use crate::api::{ApiClient, LikeKind, LikeStatus};
use crate::error::ApiError;

/// A resource whose like state can be read and toggled.
#[async_trait]
pub trait LikeTarget: Send + Sync {
    /// Current authoritative state for this client's identity.
    async fn fetch_status(&self) -> Result<LikeStatus, ApiError>;

    /// Flip the like on the server and return the resulting state.
    async fn toggle(&self) -> Result<LikeStatus, ApiError>;

    /// Short label for logs, e.g. `post:42`.
    fn label(&self) -> String;
}

/// A post or comment on the blog API.
#[derive(Debug, Clone)]
pub struct ApiLikeTarget {
    client: ApiClient,
    kind: LikeKind,
    id: String,
}

impl ApiLikeTarget {
    pub fn new(client: ApiClient, kind: LikeKind, id: impl Into<String>) -> Self {
        Self {
            client,
            kind,
            id: id.into(),
        }
    }

    pub fn post(client: ApiClient, id: impl Into<String>) -> Self {
        Self::new(client, LikeKind::Post, id)
    }

    pub fn comment(client: ApiClient, id: impl Into<String>) -> Self {
        Self::new(client, LikeKind::Comment, id)
    }

    pub fn kind(&self) -> LikeKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl LikeTarget for ApiLikeTarget {
    async fn fetch_status(&self) -> Result<LikeStatus, ApiError> {
        self.client.like_status(self.kind, &self.id).await
    }

    async fn toggle(&self) -> Result<LikeStatus, ApiError> {
        self.client.toggle_like(self.kind, &self.id).await
    }

    fn label(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

//! Auth session integration tests.
//!
//! Tests verify:
//! - Login and registration persist the token and set the user
//! - Restore from a persisted token, valid or revoked
//! - Logout and 401 expiry share the same teardown

use std::sync::Arc;

use blog_client::storage::MemoryStore;
use blog_client::{AuthError, AuthSession, Credentials, PostQuery, Registration};

use super::test_utils::{
    client_with_store, eventually, memory_client, FakeBlog, ADMIN_EMAIL, PASSWORD, USER_EMAIL,
};

fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: PASSWORD.to_string(),
    }
}

#[tokio::test]
async fn test_login_sets_user_and_token() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));

    let user = auth.login(&credentials(ADMIN_EMAIL)).await.unwrap();
    assert_eq!(user.username, "admin");
    assert!(auth.is_authenticated());
    assert!(auth.is_admin());
    assert!(!auth.is_loading());
    assert!(auth.client().session().has_token());
}

#[tokio::test]
async fn test_plain_user_is_not_admin() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));

    auth.login(&credentials(USER_EMAIL)).await.unwrap();
    assert!(auth.is_authenticated());
    assert!(!auth.is_admin());
}

#[tokio::test]
async fn test_failed_login_stores_nothing() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));

    let err = auth
        .login(&Credentials {
            email: ADMIN_EMAIL.to_string(),
            password: "nope".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Api(_)));
    assert!(!auth.is_authenticated());
    assert!(!auth.client().session().has_token());
}

#[tokio::test]
async fn test_register_logs_in() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));

    let user = auth
        .register(&Registration {
            username: "dora".to_string(),
            email: "dora@blog.test".to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.username, "dora");
    assert_eq!(user.role, "user");
    assert!(auth.client().session().has_token());
}

#[tokio::test]
async fn test_restore_with_valid_token() {
    let blog = FakeBlog::start().await;
    let storage = Arc::new(MemoryStore::new());

    let first = AuthSession::new(client_with_store(blog.base_url(), storage.clone()));
    first.login(&credentials(ADMIN_EMAIL)).await.unwrap();

    // Same profile, new process
    let second = AuthSession::new(client_with_store(blog.base_url(), storage));
    assert!(second.is_loading());
    let user = second.restore().await.unwrap().unwrap();
    assert_eq!(user.email, ADMIN_EMAIL);
    assert!(second.is_admin());
    assert!(!second.is_loading());
}

#[tokio::test]
async fn test_restore_with_revoked_token() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));
    auth.login(&credentials(ADMIN_EMAIL)).await.unwrap();
    blog.revoke_tokens();

    assert!(auth.restore().await.unwrap().is_none());
    assert!(!auth.is_authenticated());
    assert!(!auth.client().session().has_token());
}

#[tokio::test]
async fn test_restore_without_token_skips_network() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));

    assert!(auth.restore().await.unwrap().is_none());
    assert!(blog.requests().is_empty());
}

#[tokio::test]
async fn test_logout() {
    let blog = FakeBlog::start().await;
    let auth = AuthSession::new(memory_client(blog.base_url()));
    auth.login(&credentials(ADMIN_EMAIL)).await.unwrap();

    auth.logout();
    assert!(!auth.is_authenticated());
    assert!(!auth.client().session().has_token());

    auth.client()
        .list_posts(&PostQuery::default())
        .await
        .unwrap();
    let last = blog.requests().pop().unwrap();
    assert!(last.authorization.is_none());
}

#[tokio::test]
async fn test_expiry_anywhere_logs_out() {
    let blog = FakeBlog::start().await;
    let auth = Arc::new(AuthSession::new(memory_client(blog.base_url())));
    let watcher = auth.watch_expiry();
    auth.login(&credentials(ADMIN_EMAIL)).await.unwrap();

    blog.revoke_tokens();
    // Any call site, not only auth calls, triggers the reset
    let err = auth.client().toggle_publish("p1").await.unwrap_err();
    assert_eq!(err.status(), Some(http::StatusCode::UNAUTHORIZED));

    assert!(eventually(|| !auth.is_authenticated()).await);
    assert!(!auth.client().session().has_token());
    watcher.abort();
}

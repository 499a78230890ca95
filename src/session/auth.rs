//! Auth session: current user, role and token lifecycle.
//!
//! Tokens are created by [`AuthSession::login`] / [`AuthSession::register`]
//! and destroyed in exactly two situations, both through
//! [`SessionStore::clear_token`](super::SessionStore::clear_token):
//!
//! - explicit [`AuthSession::logout`]
//! - a 401 seen by the request pipeline, which then broadcasts
//!   [`AuthEvent::Expired`]; the session reacts in [`AuthSession::handle_event`]

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthEvent, AuthResponse, Credentials, Registration, User};
use crate::error::{ApiError, AuthError};

/// Point-in-time view of the auth state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    /// True until the persisted token (if any) has been checked.
    pub loading: bool,
}

/// Process-wide authentication state.
#[derive(Debug)]
pub struct AuthSession {
    client: ApiClient,
    state: RwLock<AuthSnapshot>,
}

impl AuthSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: RwLock::new(AuthSnapshot {
                user: None,
                loading: true,
            }),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthSnapshot> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthSnapshot> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.read().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.read().user.as_ref().is_some_and(User::is_admin)
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    fn set_user(&self, user: Option<User>) {
        let mut state = self.write();
        state.user = user;
        state.loading = false;
    }

    /// Pick up a persisted token from a previous run.
    ///
    /// Without a token this resolves to anonymous immediately. A rejected
    /// token has already been cleared by the pipeline. Any other failure
    /// leaves the token in place for the next attempt.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        if !self.client.session().has_token() {
            self.set_user(None);
            return Ok(None);
        }

        match self.client.current_user().await {
            Ok(user) => {
                debug!(user = %user.username, "Restored session");
                self.set_user(Some(user.clone()));
                Ok(Some(user))
            }
            Err(ApiError::Unauthorized { .. }) => {
                self.set_user(None);
                Ok(None)
            }
            Err(e) => {
                self.write().loading = false;
                Err(e.into())
            }
        }
    }

    fn accept(&self, response: AuthResponse) -> Result<User, AuthError> {
        self.client.session().set_token(&response.token)?;
        info!(user = %response.user.username, admin = response.user.is_admin(), "Logged in");
        self.set_user(Some(response.user.clone()));
        Ok(response.user)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let response = self.client.login(credentials).await?;
        self.accept(response)
    }

    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let response = self.client.register(registration).await?;
        self.accept(response)
    }

    /// Forget the token and the user.
    pub fn logout(&self) {
        let had_token = self.client.session().clear_token();
        self.set_user(None);
        info!(had_token = had_token, "Logged out");
    }

    /// React to a pipeline event.
    pub fn handle_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::Expired { path } => {
                if self.is_authenticated() {
                    warn!(path = %path, "Session expired");
                }
                // The pipeline already removed the token.
                self.set_user(None);
            }
        }
    }

    /// Follow the pipeline's events on a background task.
    pub fn watch_expiry(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.client.subscribe();
        let session = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => session.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped = skipped, "Auth listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

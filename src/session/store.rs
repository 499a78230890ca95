use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Storage key of the session identifier.
pub const SESSION_ID_KEY: &str = "blogSessionId";

/// Process-wide session state backed by client-local storage.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// The underlying storage, shared with the identity provider.
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.storage)
    }

    /// The persisted bearer token, if any.
    ///
    /// An unreadable store is treated as "no token": the request goes out
    /// anonymously rather than failing.
    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read auth token, sending request anonymously");
                None
            }
        }
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    /// Persist a freshly issued token.
    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        debug!("Stored auth token");
        Ok(())
    }

    /// Destroy the persisted token. Returns whether one was present.
    pub fn clear_token(&self) -> bool {
        let had_token = self.has_token();
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove auth token");
        }
        had_token
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_token", &self.has_token())
            .finish()
    }
}

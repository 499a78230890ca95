//! Session identity provider.
//!
//! The identifier has three underscore-separated parts:
//!
//! ```text
//! lq3k9z1c_4fzyo82k1x5_blogclient010linux
//! └──┬───┘ └────┬────┘ └────────┬────────┘
//!  time(36)  random(36)   fingerprint[..20]
//! ```
//!
//! It is generated once per storage profile and never expires.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::{debug, warn};

use super::store::SESSION_ID_KEY;
use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// Characters kept from the fingerprint.
const FINGERPRINT_LEN: usize = 20;

/// Environment description mixed into new identifiers to reduce collisions
/// across devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Fingerprint {
    /// Describe the running process.
    ///
    /// A native process has no screen; the dimensions are reported as zero.
    pub fn detect() -> Self {
        let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| "en-US".to_string());

        Self {
            user_agent: format!(
                "{}/{} ({}; {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            locale,
            screen_width: 0,
            screen_height: 0,
        }
    }

    /// The raw string that gets sanitized and truncated.
    pub fn raw(&self) -> String {
        format!(
            "{}{}{}{}",
            self.user_agent, self.locale, self.screen_width, self.screen_height
        )
    }
}

/// Strip everything but ASCII letters and digits, keep the first 20.
pub fn sanitize_fingerprint(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(FINGERPRINT_LEN)
        .collect()
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    // Only ASCII digits were pushed.
    String::from_utf8(out).unwrap_or_default()
}

/// Build a fresh identifier from a timestamp (ms since epoch), random bits
/// and a fingerprint.
pub fn generate_session_id(timestamp_ms: u128, random: u64, fingerprint: &Fingerprint) -> String {
    format!(
        "{}_{}_{}",
        to_base36(timestamp_ms),
        to_base36(random as u128),
        sanitize_fingerprint(&fingerprint.raw())
    )
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Produces and persists the per-profile session identifier.
pub struct SessionIdentity {
    storage: Arc<dyn KeyValueStore>,
    fingerprint: Fingerprint,
    /// Used only when storage cannot hold the identifier.
    fallback: OnceLock<String>,
    /// Serializes the check-generate-store path on first use.
    create_lock: Mutex<()>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_fingerprint(storage, Fingerprint::detect())
    }

    pub fn with_fingerprint(storage: Arc<dyn KeyValueStore>, fingerprint: Fingerprint) -> Self {
        Self {
            storage,
            fingerprint,
            fallback: OnceLock::new(),
            create_lock: Mutex::new(()),
        }
    }

    fn generate(&self) -> String {
        let random: u64 = rand::thread_rng().gen();
        generate_session_id(now_ms(), random, &self.fingerprint)
    }

    fn fallback_id(&self) -> String {
        self.fallback.get_or_init(|| self.generate()).clone()
    }

    /// Return the session identifier, creating and persisting it on first use.
    ///
    /// Never fails: if storage is unusable the identifier is kept in memory
    /// for the lifetime of this provider instead.
    pub fn session_id(&self) -> String {
        match self.stored() {
            Ok(Some(id)) => return id,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Cannot read session identifier, using in-memory identifier");
                return self.fallback_id();
            }
        }

        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have stored one while we waited.
        match self.stored() {
            Ok(Some(id)) => return id,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Cannot read session identifier, using in-memory identifier");
                return self.fallback_id();
            }
        }

        if let Some(id) = self.fallback.get() {
            return id.clone();
        }

        let id = self.generate();
        match self.storage.set(SESSION_ID_KEY, &id) {
            Ok(()) => {
                debug!(session_id = %id, "Created session identifier");
                id
            }
            Err(e) => {
                warn!(error = %e, "Cannot persist session identifier, keeping it in memory");
                self.fallback.get_or_init(|| id).clone()
            }
        }
    }

    fn stored(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .storage
            .get(SESSION_ID_KEY)?
            .filter(|id| !id.is_empty()))
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

//! Session state: who this client is, and whether it is logged in.
//!
//! - [`SessionIdentity`] produces the per-profile session identifier sent on
//!   every request, independent of login state.
//! - [`SessionStore`] owns the persisted bearer token. It is the only place
//!   that reads or writes the token key, and [`SessionStore::clear_token`] is
//!   the single teardown used by both logout and the 401 handler.
//! - [`AuthSession`] tracks the current user and role on top of both.

pub mod auth;
mod identity;
mod store;

pub use auth::{AuthSession, AuthSnapshot};
pub use identity::{generate_session_id, sanitize_fingerprint, Fingerprint, SessionIdentity};
pub use store::{SessionStore, SESSION_ID_KEY, TOKEN_KEY};

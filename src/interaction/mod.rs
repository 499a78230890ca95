//! Like/unlike interaction with optimistic updates.
//!
//! # State Machine
//!
//! ```text
//!            toggle()                      response ok
//!   Idle ─────────────▶ Optimistic-Pending ───────────▶ Idle (server values)
//!     ▲                        │
//!     │      response err      │
//!     └────────────────────────┘ (pre-toggle values restored)
//! ```
//!
//! A toggle is ignored while another is in flight or within 500 ms of the
//! previous one. The same [`LikeController`] drives posts and comments; the
//! resource is abstracted behind [`LikeTarget`].

mod controller;
mod target;

pub use controller::{IgnoreReason, LikeController, ToggleOutcome, DEBOUNCE_INTERVAL};
pub use target::{ApiLikeTarget, LikeTarget};

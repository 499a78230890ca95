use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::target::LikeTarget;
use crate::api::LikeStatus;
use crate::error::ApiError;

/// Minimum spacing between two accepted toggles.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(500);

/// Why a toggle did not go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A previous toggle has not resolved yet
    InFlight,
    /// The previous toggle was less than [`DEBOUNCE_INTERVAL`] ago
    TooSoon,
    /// The controller was detached from its view
    Detached,
}

/// Result of a call to [`LikeController::toggle`].
#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    /// No request was issued; state untouched.
    Ignored(IgnoreReason),
    /// The server accepted the toggle; state now holds its values.
    Confirmed(LikeStatus),
    /// The request failed; state restored to the pre-toggle values.
    RolledBack { state: LikeStatus, error: ApiError },
    /// The response arrived after [`LikeController::detach`] and was dropped.
    Discarded,
}

#[derive(Debug, Default)]
struct Flags {
    in_flight: bool,
    last_toggle: Option<Instant>,
    detached: bool,
}

/// Clears `in_flight` even if the toggle future is dropped mid-request.
struct InFlightGuard<'a> {
    flags: &'a Mutex<Flags>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut flags) = self.flags.lock() {
            flags.in_flight = false;
        }
    }
}

/// Optimistic like/unlike state for one post or comment.
///
/// Owners render from [`state`](Self::state) or a [`subscribe`](Self::subscribe)d
/// receiver; every optimistic change, confirmation and rollback is published.
pub struct LikeController<T: LikeTarget> {
    target: T,
    state: watch::Sender<LikeStatus>,
    flags: Mutex<Flags>,
}

/// The state the user should see right after toggling `current`.
fn optimistic(current: LikeStatus) -> LikeStatus {
    let liked = !current.liked;
    let likes_count = if liked {
        current.likes_count.saturating_add(1)
    } else {
        current.likes_count.saturating_sub(1)
    };
    LikeStatus { liked, likes_count }
}

impl<T: LikeTarget> LikeController<T> {
    /// Create a controller showing `initial` until the server says otherwise.
    pub fn new(target: T, initial: LikeStatus) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            target,
            state,
            flags: Mutex::new(Flags::default()),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// The state to display right now.
    pub fn state(&self) -> LikeStatus {
        *self.state.borrow()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<LikeStatus> {
        self.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.flags().in_flight
    }

    pub fn is_detached(&self) -> bool {
        self.flags().detached
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        // Flags are plain data; a panic elsewhere cannot leave them torn.
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Learn the current state from the server, replacing the initial values.
    ///
    /// On failure the initial values stay in place and the error is returned.
    pub async fn mount(&self) -> Result<LikeStatus, ApiError> {
        match self.target.fetch_status().await {
            Ok(status) => {
                let flags = self.flags();
                if flags.detached {
                    debug!(target = %self.target.label(), "Dropping like status for detached view");
                } else if flags.in_flight {
                    debug!(target = %self.target.label(), "Toggle in flight, keeping optimistic state");
                } else {
                    self.state.send_replace(status);
                }
                Ok(self.state())
            }
            Err(e) => {
                warn!(target = %self.target.label(), error = %e, "Failed to fetch like status");
                Err(e)
            }
        }
    }

    /// Flip the like with an optimistic update.
    pub async fn toggle(&self) -> ToggleOutcome {
        let previous = {
            let mut flags = self.flags();
            if flags.detached {
                return ToggleOutcome::Ignored(IgnoreReason::Detached);
            }
            if flags.in_flight {
                return ToggleOutcome::Ignored(IgnoreReason::InFlight);
            }
            let now = Instant::now();
            if let Some(last) = flags.last_toggle {
                if now.duration_since(last) < DEBOUNCE_INTERVAL {
                    return ToggleOutcome::Ignored(IgnoreReason::TooSoon);
                }
            }
            flags.last_toggle = Some(now);
            flags.in_flight = true;

            let previous = self.state();
            self.state.send_replace(optimistic(previous));
            previous
        };

        let guard = InFlightGuard { flags: &self.flags };
        let result = self.target.toggle().await;
        drop(guard);

        if self.flags().detached {
            debug!(target = %self.target.label(), "Toggle resolved after detach, discarding");
            return ToggleOutcome::Discarded;
        }

        match result {
            Ok(status) => {
                self.state.send_replace(status);
                ToggleOutcome::Confirmed(status)
            }
            Err(error) => {
                warn!(target = %self.target.label(), error = %error, "Toggle failed, rolling back");
                self.state.send_replace(previous);
                ToggleOutcome::RolledBack {
                    state: previous,
                    error,
                }
            }
        }
    }

    /// The owning view is gone: later responses must not touch state.
    pub fn detach(&self) {
        self.flags().detached = true;
    }
}

impl<T: LikeTarget> std::fmt::Debug for LikeController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LikeController")
            .field("target", &self.target.label())
            .field("state", &self.state())
            .finish()
    }
}

//! Session State
//!
//! The in-memory session and the cell that owns it. The cell is the single
//! source of truth: the token store is written on every transition and read
//! only once, at startup.
//!
//! Every transition runs inside the watch channel's critical section, so
//! transitions and their store writes are linearized. A generation counter
//! tags each sign-in attempt; logout and forced logout bump it, which makes
//! late sign-in responses detectable.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use super::store::{StoredCredentials, TokenStore};

/// The authenticated identity of this process
///
/// Construction fails when the token or email is empty, so an
/// `Authenticated` state always carries both.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    email: String,
    display_name: String,
    user_id: Option<String>,
    avatar: Option<String>,
    established_at: DateTime<Utc>,
}

impl Session {
    /// Create a session; the display name falls back to the email
    pub fn new(
        token: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
    ) -> Option<Self> {
        let token = token.into();
        let email = email.into();
        if token.trim().is_empty() || email.trim().is_empty() {
            return None;
        }

        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Some(Self {
            token,
            email,
            display_name,
            user_id: None,
            avatar: None,
            established_at: Utc::now(),
        })
    }

    /// Attach the optional profile fields returned by the backend
    pub fn with_profile(mut self, user_id: Option<String>, avatar: Option<String>) -> Self {
        self.user_id = user_id;
        self.avatar = avatar;
        self
    }

    pub fn from_stored(stored: StoredCredentials) -> Option<Self> {
        Self::new(stored.token, stored.email, Some(stored.name))
    }

    pub fn to_stored(&self) -> StoredCredentials {
        StoredCredentials {
            token: self.token.clone(),
            email: self.email.clone(),
            name: self.display_name.clone(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("user_id", &self.user_id)
            .field("established_at", &self.established_at)
            .finish()
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Startup read has not happened yet
    #[default]
    Unknown,
    /// No valid token
    Unauthenticated,
    /// Token and email present
    Authenticated(Session),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated(_) => "authenticated",
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit logout
    Logout,
    /// The backend answered 401
    Unauthorized,
}

/// Shared owner of the session state
///
/// Handed to the HTTP client (for bearer tokens and forced logout) and to
/// the session manager (for sign-in transitions).
///
/// Store writes run inside the state lock, so storage backends must stay
/// small synchronous key/value writes.
pub struct SessionCell {
    state: watch::Sender<SessionState>,
    store: TokenStore,
    generation: AtomicU64,
    epoch: AtomicU64,
}

impl SessionCell {
    pub fn new(store: TokenStore) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            state,
            store,
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Resolve the `Unknown` state from the token store
    ///
    /// Only the first call reads the store; later calls return the
    /// current state unchanged.
    pub fn restore(&self) -> SessionState {
        self.state.send_if_modified(|state| {
            if !matches!(state, SessionState::Unknown) {
                return false;
            }

            *state = match self.store.read().and_then(Session::from_stored) {
                Some(session) => {
                    tracing::info!(email = %session.email(), "Restored stored session");
                    SessionState::Authenticated(session)
                }
                None => {
                    tracing::debug!("No stored session");
                    SessionState::Unauthenticated
                }
            };
            true
        });
        self.state()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Token to present on authenticated requests
    pub fn bearer_token(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.token().to_string())
    }

    /// Observe every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Changes only when a session is installed or ended
    ///
    /// Failed sign-in attempts leave it alone, unlike [`generation`](Self::generation).
    pub fn session_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Take a ticket for a new sign-in attempt
    ///
    /// Invalidates tickets held by attempts still in flight.
    pub fn begin_attempt(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a session obtained with `ticket`
    ///
    /// Returns `false` and leaves everything untouched when the ticket is
    /// stale.
    pub fn establish(&self, ticket: u64, session: Session) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            self.store.save(&session.to_stored());
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::Authenticated(session);
            applied = true;
            true
        });
        applied
    }

    /// Resolve `Unknown` to `Unauthenticated` after a failed attempt
    ///
    /// An existing authenticated session is kept.
    pub fn settle_unauthenticated(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Unknown) {
                *state = SessionState::Unauthenticated;
                true
            } else {
                false
            }
        });
    }

    /// End the session and clear the store
    ///
    /// Always clears the store, even when already unauthenticated.
    pub fn end(&self, reason: EndReason) {
        self.state.send_if_modified(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.store.clear();

            if let SessionState::Authenticated(session) = state {
                match reason {
                    EndReason::Logout => {
                        tracing::info!(email = %session.email(), "Session ended by logout")
                    }
                    EndReason::Unauthorized => {
                        tracing::warn!(email = %session.email(), "Session revoked by server")
                    }
                }
            }

            let changed = !matches!(state, SessionState::Unauthenticated);
            *state = SessionState::Unauthenticated;
            changed
        });
    }
}

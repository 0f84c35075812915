//! Session Manager
//!
//! Sign-in, registration, Google sign-in and logout on top of the shared
//! [`SessionCell`]. Failures come back as [`AuthError`] values; nothing
//! here panics or lets a transport error escape any other way.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::error::{AuthError, AuthResult};
use super::identity::{decode_identity_token, merge_identity, IdentityClaims};
use super::state::{EndReason, Session, SessionCell, SessionState};
use crate::client::{ApiClient, ApiResult, CredentialResponse, UserProfile};

/// Drives session transitions through the backend
pub struct SessionManager {
    client: Arc<ApiClient>,
    in_flight: AtomicUsize,
}

impl SessionManager {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            in_flight: AtomicUsize::new(0),
        }
    }

    fn cell(&self) -> &SessionCell {
        self.client.session()
    }

    /// Startup read of the token store; runs once
    pub fn restore(&self) -> SessionState {
        self.cell().restore()
    }

    pub fn state(&self) -> SessionState {
        self.cell().state()
    }

    pub fn session(&self) -> Option<Session> {
        self.cell().session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell().is_authenticated()
    }

    /// Whether any auth operation is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.cell().subscribe()
    }

    /// Email/password sign-in
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let request = self.client.login(email, password);

        self.complete("login", request, |token, user| {
            let name = user.as_ref().and_then(|u| u.name.clone());
            Ok(build_session(token, email, name, user))
        })
        .await
    }

    /// Google sign-in with an identity token credential
    pub async fn google_login(&self, credential: &str) -> AuthResult<Session> {
        let claims = match decode_identity_token(credential) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Could not decode identity token, relying on server profile");
                IdentityClaims::default()
            }
        };
        let request = self.client.google_auth(credential);

        self.complete("google_login", request, |token, user| {
            let identity =
                merge_identity(&claims, user.as_ref()).ok_or(AuthError::MissingIdentity)?;
            Ok(build_session(
                token,
                &identity.email,
                Some(identity.display_name),
                user,
            ))
        })
        .await
    }

    /// Create an account and sign in with it
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<Session> {
        let request = self.client.register(name, email, password);

        self.complete("register", request, |token, user| {
            Ok(build_session(token, email, Some(name.to_string()), user))
        })
        .await
    }

    /// Notify the server, then clear local state unconditionally
    pub async fn logout(&self) {
        let _guard = InFlight::enter(&self.in_flight);

        if self.cell().bearer_token().is_some() {
            if let Err(e) = self.client.logout().await {
                tracing::warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        } else {
            tracing::debug!("No active session, skipping server-side logout");
        }

        self.cell().end(EndReason::Logout);
    }

    async fn complete<Fut, P>(
        &self,
        operation: &'static str,
        request: Fut,
        project: P,
    ) -> AuthResult<Session>
    where
        Fut: Future<Output = ApiResult<CredentialResponse>>,
        P: FnOnce(String, Option<UserProfile>) -> AuthResult<Option<Session>>,
    {
        let _guard = InFlight::enter(&self.in_flight);
        let ticket = self.cell().begin_attempt();

        let outcome = match request.await {
            Ok(response) => match response.access_token.filter(|t| !t.trim().is_empty()) {
                Some(token) => {
                    project(token, response.user).and_then(|s| s.ok_or(AuthError::MissingIdentity))
                }
                None => Err(AuthError::MissingToken),
            },
            Err(e) => Err(AuthError::Api(e)),
        };

        match outcome {
            Ok(session) => {
                if self.cell().establish(ticket, session.clone()) {
                    tracing::info!(operation, email = %session.email(), "Signed in");
                    Ok(session)
                } else {
                    tracing::warn!(operation, "Discarding credentials from a superseded sign-in");
                    Err(AuthError::Superseded)
                }
            }
            Err(e) => {
                self.cell().settle_unauthenticated();
                tracing::warn!(operation, error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }
}

fn build_session(
    token: String,
    email: &str,
    name: Option<String>,
    user: Option<UserProfile>,
) -> Option<Session> {
    let (user_id, avatar) = user.map(|u| (u.id, u.avatar)).unwrap_or_default();
    Session::new(token, email, name).map(|s| s.with_profile(user_id, avatar))
}

/// Counts in-flight operations for `is_loading`
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

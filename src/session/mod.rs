//! Session Lifecycle
//!
//! Client-side authentication state for the triage backend.
//!
//! ## Architecture
//!
//! - **TokenStore**: durable mirror of the session in session-scoped storage
//! - **SessionCell**: single owner of the in-memory state, shared with the HTTP client
//! - **SessionManager**: login, Google login, registration and logout
//!
//! ## State machine
//!
//! 1. `Unknown` until the one startup read of the token store
//! 2. `Authenticated` after a successful sign-in or restore
//! 3. `Unauthenticated` after logout, a failed first sign-in, or any HTTP 401

mod error;
mod identity;
mod manager;
mod state;
mod store;

pub use error::{AuthError, AuthResult, StorageError};
pub use identity::{decode_identity_token, merge_identity, IdentityClaims, IdentityError, ResolvedIdentity};
pub use manager::SessionManager;
pub use state::{EndReason, Session, SessionCell, SessionState};
pub use store::{
    FileStorage, MemoryStorage, SessionStorage, StoredCredentials, TokenStore, EMAIL_KEY,
    NAME_KEY, TOKEN_KEY,
};

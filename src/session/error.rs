//! Session error types
//!
//! Errors surfaced by authentication operations and by the storage
//! backends behind the token store.

use thiserror::Error;

use crate::client::ApiError;

/// Errors returned by login, registration and Google sign-in
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend answered without an access token
    #[error("Access token missing from server response")]
    MissingToken,

    /// Neither the identity token nor the backend supplied an email
    #[error("Unable to determine the account email")]
    MissingIdentity,

    /// A logout or a newer sign-in happened while this one was in flight
    #[error("Sign-in was superseded by a newer session change")]
    Superseded,

    /// The request itself failed
    #[error("{0}")]
    Api(#[from] ApiError),
}

/// Result alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised by a [`SessionStorage`](super::SessionStorage) backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

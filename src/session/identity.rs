//! Google identity token handling
//!
//! Decodes the claims of a Google ID token (a JWT) without verifying it;
//! the backend does the verification. The claims only feed display data.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::client::UserProfile;

/// Claims read from the identity token payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Email and display name picked from the available sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub email: String,
    pub display_name: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity token is not a JWT")]
    Malformed,

    #[error("identity token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("identity token payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Decode the payload segment of a JWT
pub fn decode_identity_token(credential: &str) -> Result<IdentityClaims, IdentityError> {
    let mut segments = credential.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(IdentityError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Merge identity token claims with the backend profile
///
/// Identity-token fields win, backend fields come second, and the email
/// is the last resort for the display name.
pub fn merge_identity(
    claims: &IdentityClaims,
    user: Option<&UserProfile>,
) -> Option<ResolvedIdentity> {
    let email = non_empty(claims.email.as_deref())
        .or_else(|| non_empty(user.and_then(|u| u.email.as_deref())))?;

    let display_name = non_empty(claims.name.as_deref())
        .or_else(|| non_empty(user.and_then(|u| u.name.as_deref())))
        .unwrap_or(email);

    Some(ResolvedIdentity {
        email: email.to_string(),
        display_name: display_name.to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

//! Data Cache
//!
//! In-memory copies of the messages, analytics and dashboard data fetched
//! for the current session.
//!
//! ## Rules
//!
//! - Each successful fetch replaces its collection wholesale
//! - Fetches are skipped while no session is active
//! - Signing in loads every collection once; signing out empties them
//! - A failed fetch records the error and applies the [`ErrorPolicy`]

mod data;

pub use data::{CacheState, DataCache};

use serde::Deserialize;

/// What a failed fetch does to the collection it was refreshing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Empty the collection so stale data is never shown
    #[default]
    Clear,
    /// Keep showing the last successful result
    Keep,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clear" => Ok(ErrorPolicy::Clear),
            "keep" | "stale" => Ok(ErrorPolicy::Keep),
            other => Err(format!("unknown error policy: {}", other)),
        }
    }
}

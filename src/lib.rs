//! # Triage
//!
//! Client for the message triage backend: email/Google sign-in with a
//! persisted session, an authenticated REST client, and a data cache that
//! follows the session.
//!
//! ## Modules
//!
//! - [`session`]: Session state machine, token store and sign-in operations
//! - [`client`]: REST client with bearer injection and forced logout on 401
//! - [`cache`]: Messages, analytics and stats cached for the current session
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use triage::{ApiClient, ClientConfig, DataCache, SessionCell, SessionManager, TokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cell = Arc::new(SessionCell::new(TokenStore::in_memory()));
//!     let client = Arc::new(ApiClient::new(ClientConfig::default(), Arc::clone(&cell))?);
//!
//!     let sessions = SessionManager::new(Arc::clone(&client));
//!     let cache = Arc::new(DataCache::new(Arc::clone(&client), Default::default()));
//!     let _watcher = Arc::clone(&cache).watch_session();
//!
//!     sessions.restore();
//!     match sessions.login("a@b.com", "secret").await {
//!         Ok(session) => println!("Signed in as {}", session.display_name()),
//!         Err(e) => println!("Sign-in failed: {}", e),
//!     }
//!
//!     sessions.logout().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod session;

pub use session::{
    AuthError, AuthResult, EndReason, Session, SessionCell, SessionManager, SessionState,
    StoredCredentials, TokenStore,
};

pub use client::{
    AnalyticsData, ApiClient, ApiError, ApiResult, Auth, ClientConfig, DashboardStats,
    FetchResponse, Message, MessageContext, MessageQuery, MessageSource, PredictRequest,
    Prediction, Priority, UserProfile,
};

pub use cache::{CacheState, DataCache, ErrorPolicy};

pub use config::{
    generate_default_config, ApiConfig, CacheConfig, Config, ConfigError, LoggingConfig,
    SessionConfig, StoreKind,
};

//! Triage Backend Client
//!
//! REST client for the triage backend.
//!
//! ## Behavior
//!
//! - Bearer token taken from the shared [`SessionCell`](crate::session::SessionCell)
//! - Any HTTP 401 ends the session before the error is returned
//! - Non-2xx bodies are reduced to one message (`message`, then `detail`, then the status line)
//! - No automatic retries

mod dto;
mod endpoints;
mod error;
mod http;

pub use dto::{
    AnalyticsData, ContextSlice, CredentialResponse, DashboardStats, FeedbackBucket,
    FetchResponse, Message, MessageContext, MessageQuery, MessageSource, MessagesPayload,
    PredictRequest, Prediction, Priority, PriorityBucket, UserProfile, UserSettings, VolumeBucket,
};
pub use error::{ApiError, ApiResult};
pub use http::{ApiClient, Auth, ClientConfig};

//! Triage REST API Client
//!
//! HTTP client for the triage backend. Attaches the session's bearer token,
//! normalizes error responses, and ends the session on any HTTP 401.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::session::{EndReason, SessionCell};

/// Whether a request carries the bearer token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Auth {
    /// Attach `Authorization: Bearer <token>` when a session exists
    #[default]
    Bearer,
    /// Send without credentials (sign-in endpoints)
    Anonymous,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g., "http://localhost:8000")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
            user_agent: format!("triage/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&ApiConfig> for ClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            request_timeout_ms: config.request_timeout_secs.saturating_mul(1000),
            ..Default::default()
        }
    }
}

/// Triage backend client
///
/// Constructed once and shared as `Arc<ApiClient>` by the session manager
/// and the data cache.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    session: Arc<SessionCell>,
}

impl ApiClient {
    /// Create a new client bound to a session
    pub fn new(config: ClientConfig, session: Arc<SessionCell>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;

        let config = ClientConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self {
            client,
            config,
            session,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The session this client authenticates with
    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url, endpoint)
    }

    /// Authenticated GET with query parameters
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let builder = self.client.get(self.url(endpoint)).query(query);
        self.send(builder, Method::GET, endpoint, Auth::Bearer).await
    }

    /// POST a JSON body
    pub async fn post<B, T>(&self, endpoint: &str, body: &B, auth: Auth) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.client.post(self.url(endpoint)).json(body);
        self.send(builder, Method::POST, endpoint, auth).await
    }

    /// Authenticated PUT with a JSON body
    pub async fn put<B, T>(&self, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.client.put(self.url(endpoint)).json(body);
        self.send(builder, Method::PUT, endpoint, Auth::Bearer).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        method: Method,
        endpoint: &str,
        auth: Auth,
    ) -> ApiResult<T> {
        let request_id = Uuid::new_v4();
        let mut builder = builder.header("X-Request-Id", request_id.to_string());

        if auth == Auth::Bearer {
            if let Some(token) = self.session.bearer_token() {
                builder = builder.bearer_auth(token);
            }
        }

        tracing::debug!(request_id = %request_id, method = %method, endpoint, "API request");

        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from_transport(e);
            tracing::error!(request_id = %request_id, method = %method, endpoint, error = %err, "API request failed");
            err
        })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &body);

            if status == StatusCode::UNAUTHORIZED {
                tracing::warn!(request_id = %request_id, endpoint, "Authorization rejected, ending session");
                self.session.end(EndReason::Unauthorized);
            } else {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    endpoint,
                    status = status.as_u16(),
                    error = %err,
                    "API error response"
                );
            }
            return Err(err);
        }

        let body = response.text().await.map_err(ApiError::from_transport)?;
        tracing::debug!(request_id = %request_id, status = status.as_u16(), bytes = body.len(), "API response");

        decode_body(&body).map_err(|e| {
            tracing::error!(request_id = %request_id, endpoint, error = %e, "Undecodable API response");
            e
        })
    }
}

/// Decode a success body; an empty body reads as JSON `null`
fn decode_body<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

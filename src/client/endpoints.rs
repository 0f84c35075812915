//! Typed backend endpoints
//!
//! - `POST /auth/login`, `/auth/google`, `/auth/register` (anonymous)
//! - `POST /auth/logout`
//! - `GET /messages`, `POST /messages/fetch`, `POST /feedback`, `POST /predict`
//! - `GET /dashboard/stats`, `GET /analytics`, `GET /analytics/sentiment`
//! - `GET|PUT /user/settings`

use super::dto::*;
use super::error::ApiResult;
use super::http::{ApiClient, Auth};

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<CredentialResponse> {
        self.post("/auth/login", &LoginRequest { email, password }, Auth::Anonymous)
            .await
    }

    pub async fn google_auth(&self, credential: &str) -> ApiResult<CredentialResponse> {
        self.post("/auth/google", &GoogleAuthRequest { credential }, Auth::Anonymous)
            .await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<CredentialResponse> {
        let body = RegisterRequest {
            name,
            email,
            password,
        };
        self.post("/auth/register", &body, Auth::Anonymous).await
    }

    pub async fn logout(&self) -> ApiResult<serde_json::Value> {
        self.post("/auth/logout", &serde_json::json!({}), Auth::Bearer)
            .await
    }

    pub async fn messages(&self, query: &MessageQuery) -> ApiResult<Vec<Message>> {
        let payload: MessagesPayload = self.get("/messages", &query.to_pairs()).await?;
        Ok(payload.into_messages())
    }

    /// Ask the backend to collect new messages from a source
    pub async fn fetch_messages(&self, source: MessageSource) -> ApiResult<FetchResponse> {
        self.post("/messages/fetch", &FetchRequest { source }, Auth::Bearer)
            .await
    }

    pub async fn submit_feedback(
        &self,
        message_id: &str,
        priority: Priority,
        context: MessageContext,
    ) -> ApiResult<serde_json::Value> {
        let body = FeedbackRequest {
            message_id,
            corrected_priority: priority,
            corrected_context: context,
        };
        self.post("/feedback", &body, Auth::Bearer).await
    }

    pub async fn predict(&self, request: &PredictRequest) -> ApiResult<Prediction> {
        self.post("/predict", request, Auth::Bearer).await
    }

    pub async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        self.get("/dashboard/stats", &[]).await
    }

    pub async fn analytics(&self, range: &str) -> ApiResult<AnalyticsData> {
        self.get("/analytics", &[("range", range.to_string())]).await
    }

    pub async fn sentiment(&self, range: &str) -> ApiResult<serde_json::Value> {
        self.get("/analytics/sentiment", &[("range", range.to_string())])
            .await
    }

    pub async fn user_settings(&self) -> ApiResult<UserSettings> {
        self.get("/user/settings", &[]).await
    }

    pub async fn update_user_settings(&self, settings: &UserSettings) -> ApiResult<UserSettings> {
        self.put("/user/settings", settings).await
    }
}

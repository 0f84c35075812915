//! Session-aware data cache
//!
//! Holds the collections shown by the dashboard and keeps them in step with
//! the session: loaded once on sign-in, emptied on sign-out.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::ErrorPolicy;
use crate::client::{
    AnalyticsData, ApiClient, ApiResult, DashboardStats, FetchResponse, Message, MessageContext,
    MessageQuery, MessageSource, PredictRequest, Prediction, Priority,
};
use crate::config::CacheConfig;
use crate::session::SessionState;

/// Snapshot of everything the cache holds
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub messages: Vec<Message>,
    pub analytics: Option<AnalyticsData>,
    pub stats: Option<DashboardStats>,
    pub sentiment: Option<serde_json::Value>,
    pub loading_messages: bool,
    pub loading_analytics: bool,
    pub loading_stats: bool,
    pub loading_sentiment: bool,
    pub submitting_feedback: bool,
    /// Message of the last failed operation
    pub error: Option<String>,
    /// When a collection was last replaced
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl CacheState {
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading_messages
            || self.loading_analytics
            || self.loading_stats
            || self.loading_sentiment
            || self.submitting_feedback
    }
}

#[derive(Debug, Clone, Copy)]
enum Collection {
    Messages,
    Analytics,
    Stats,
    Sentiment,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Collection::Messages => "messages",
            Collection::Analytics => "analytics",
            Collection::Stats => "stats",
            Collection::Sentiment => "sentiment",
        }
    }

    fn set_loading(self, state: &mut CacheState, loading: bool) {
        match self {
            Collection::Messages => state.loading_messages = loading,
            Collection::Analytics => state.loading_analytics = loading,
            Collection::Stats => state.loading_stats = loading,
            Collection::Sentiment => state.loading_sentiment = loading,
        }
    }

    fn clear(self, state: &mut CacheState) {
        match self {
            Collection::Messages => state.messages.clear(),
            Collection::Analytics => state.analytics = None,
            Collection::Stats => state.stats = None,
            Collection::Sentiment => state.sentiment = None,
        }
    }
}

/// Cached dashboard data for the current session
pub struct DataCache {
    client: Arc<ApiClient>,
    state: RwLock<CacheState>,
    config: CacheConfig,
}

impl DataCache {
    pub fn new(client: Arc<ApiClient>, config: CacheConfig) -> Self {
        Self {
            client,
            state: RwLock::new(CacheState::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> CacheState {
        self.state.read().await.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    pub async fn analytics(&self) -> Option<AnalyticsData> {
        self.state.read().await.analytics.clone()
    }

    pub async fn stats(&self) -> Option<DashboardStats> {
        self.state.read().await.stats.clone()
    }

    pub async fn sentiment(&self) -> Option<serde_json::Value> {
        self.state.read().await.sentiment.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// Replace the message list
    ///
    /// Returns whether the collection was replaced.
    pub async fn fetch_messages(&self, query: &MessageQuery) -> bool {
        let request = self.client.messages(query);
        self.load(Collection::Messages, request, |state, messages| {
            tracing::debug!(count = messages.len(), "Messages loaded");
            state.messages = messages;
        })
        .await
    }

    pub async fn fetch_analytics(&self, range: &str) -> bool {
        let request = self.client.analytics(range);
        self.load(Collection::Analytics, request, |state, analytics| {
            state.analytics = Some(analytics);
        })
        .await
    }

    pub async fn fetch_dashboard_stats(&self) -> bool {
        let request = self.client.dashboard_stats();
        self.load(Collection::Stats, request, |state, stats| {
            state.stats = Some(stats);
        })
        .await
    }

    pub async fn fetch_sentiment(&self, range: &str) -> bool {
        let request = self.client.sentiment(range);
        self.load(Collection::Sentiment, request, |state, sentiment| {
            state.sentiment = Some(sentiment);
        })
        .await
    }

    /// Ask the backend to collect new messages, then reload on success
    ///
    /// `loading_messages` stays set for the whole collect-and-reload cycle.
    pub async fn trigger_fetch(&self, source: MessageSource) -> ApiResult<FetchResponse> {
        {
            let mut state = self.state.write().await;
            state.error = None;
            state.loading_messages = true;
        }

        let result = match self.client.fetch_messages(source).await {
            Ok(response) => {
                tracing::info!(source = %source, success = response.success, "Message collection triggered");
                if response.success {
                    self.fetch_messages(&MessageQuery::default()).await;
                }
                Ok(response)
            }
            Err(e) => {
                self.record_error("trigger_fetch", &e.to_string()).await;
                Err(e)
            }
        };

        self.state.write().await.loading_messages = false;
        result
    }

    /// Correct a message's labels; the cached copy takes the new labels
    pub async fn submit_feedback(
        &self,
        message_id: &str,
        priority: Priority,
        context: MessageContext,
    ) -> ApiResult<serde_json::Value> {
        {
            let mut state = self.state.write().await;
            state.error = None;
            state.submitting_feedback = true;
        }

        let result = self.client.submit_feedback(message_id, priority, context).await;
        self.state.write().await.submitting_feedback = false;

        match result {
            Ok(response) => {
                let mut state = self.state.write().await;
                if let Some(message) = state.messages.iter_mut().find(|m| m.id == message_id) {
                    message.priority = priority;
                    message.context = context;
                }
                tracing::info!(message_id, priority = %priority, context = %context, "Feedback submitted");
                Ok(response)
            }
            Err(e) => {
                self.record_error("submit_feedback", &e.to_string()).await;
                Err(e)
            }
        }
    }

    pub async fn predict_message(&self, request: &PredictRequest) -> ApiResult<Prediction> {
        self.clear_error().await;

        match self.client.predict(request).await {
            Ok(prediction) => Ok(prediction),
            Err(e) => {
                self.record_error("predict_message", &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Load every collection concurrently
    pub async fn refresh_all(&self) {
        let query = MessageQuery::default();
        let range = self.config.analytics_range.as_str();

        tokio::join!(
            self.fetch_messages(&query),
            self.fetch_analytics(range),
            self.fetch_dashboard_stats(),
            self.fetch_sentiment(range),
        );
    }

    /// Reset every collection to its empty form
    pub async fn clear(&self) {
        *self.state.write().await = CacheState::default();
        tracing::debug!("Data cache cleared");
    }

    /// Load on sign-in, clear on sign-out
    pub async fn on_session_change(&self, state: &SessionState) {
        match state {
            SessionState::Authenticated(session) => {
                tracing::info!(email = %session.email(), "Loading data for new session");
                self.refresh_all().await;
            }
            SessionState::Unauthenticated => self.clear().await,
            SessionState::Unknown => {}
        }
    }

    /// Follow session transitions in a background task
    ///
    /// Reacts only when the signed-in identity changes, so one sign-in
    /// triggers exactly one load.
    pub fn watch_session(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.client.session().subscribe();

        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            let mut current = initial.session().map(|s| s.token().to_string());
            if current.is_some() {
                self.on_session_change(&initial).await;
            }

            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let token = state.session().map(|s| s.token().to_string());
                if token == current {
                    continue;
                }
                current = token;
                self.on_session_change(&state).await;
            }

            tracing::debug!("Session channel closed, stopping cache watcher");
        })
    }

    async fn record_error(&self, operation: &'static str, message: &str) {
        tracing::error!(operation, error = %message, "Data operation failed");
        self.state.write().await.error = Some(message.to_string());
    }

    async fn load<T, Fut, A>(&self, collection: Collection, request: Fut, apply: A) -> bool
    where
        Fut: Future<Output = ApiResult<T>>,
        A: FnOnce(&mut CacheState, T),
    {
        let session = self.client.session();
        if !session.is_authenticated() {
            tracing::debug!(collection = collection.name(), "Skipping fetch, no active session");
            return false;
        }
        let epoch = session.session_epoch();

        {
            let mut state = self.state.write().await;
            collection.set_loading(&mut state, true);
            state.error = None;
        }

        let result = request.await;

        let mut state = self.state.write().await;
        collection.set_loading(&mut state, false);

        if session.session_epoch() != epoch {
            tracing::debug!(collection = collection.name(), "Dropping response from a previous session");
            if !session.is_authenticated() {
                collection.clear(&mut state);
            }
            return false;
        }

        match result {
            Ok(value) => {
                apply(&mut state, value);
                state.last_refreshed = Some(Utc::now());
                true
            }
            Err(e) => {
                tracing::error!(collection = collection.name(), error = %e, "Fetch failed");
                state.error = Some(e.to_string());
                if self.config.on_error == ErrorPolicy::Clear {
                    collection.clear(&mut state);
                }
                false
            }
        }
    }
}

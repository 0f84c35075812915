//! Request/Response DTOs
//!
//! Wire types for the triage backend. Response types are lenient: missing
//! fields default instead of failing the whole response.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================
// Auth
// ============================================

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleAuthRequest<'a> {
    pub credential: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Body returned by every auth endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Account profile attached to a credential response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

// ============================================
// Messages
// ============================================

/// Where a message was collected from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    #[default]
    Gmail,
    Whatsapp,
}

/// Predicted or corrected urgency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    VeryUrgent,
    Important,
    #[default]
    NotImportant,
}

/// Predicted or corrected context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageContext {
    Business,
    #[default]
    Personal,
}

macro_rules! wire_enum {
    ($ty:ty, $what:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().replace('-', "_").as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!("unknown {}: {}", $what, other)),
                }
            }
        }
    };
}

wire_enum!(MessageSource, "source", {
    MessageSource::Gmail => "gmail",
    MessageSource::Whatsapp => "whatsapp",
});

wire_enum!(Priority, "priority", {
    Priority::VeryUrgent => "very_urgent",
    Priority::Important => "important",
    Priority::NotImportant => "not_important",
});

wire_enum!(MessageContext, "context", {
    MessageContext::Business => "business",
    MessageContext::Personal => "personal",
});

/// A classified message
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "required_string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: MessageSource,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: MessageContext,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, alias = "is_read", deserialize_with = "null_as_default")]
    pub is_read: bool,
    #[serde(default, alias = "full_content", skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
}

/// `/messages` answers either `{"messages": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessagesPayload {
    Wrapped {
        #[serde(default)]
        messages: Vec<Message>,
    },
    Bare(Vec<Message>),
}

impl MessagesPayload {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            MessagesPayload::Wrapped { messages } => messages,
            MessagesPayload::Bare(messages) => messages,
        }
    }
}

/// Filters for `/messages`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageQuery {
    pub source: Option<MessageSource>,
    pub priority: Option<Priority>,
    pub context: Option<MessageContext>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MessageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: MessageSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn context(mut self, context: MessageContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Query-string pairs, only for the filters that are set
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(source) = self.source {
            pairs.push(("source", source.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.to_string()));
        }
        if let Some(context) = self.context {
            pairs.push(("context", context.to_string()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FetchRequest {
    pub source: MessageSource,
}

/// Answer to a collection trigger
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackRequest<'a> {
    pub message_id: &'a str,
    pub corrected_priority: Priority,
    pub corrected_context: MessageContext,
}

/// Message submitted for classification
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub sender: String,
    pub subject: String,
    pub content: String,
    pub source: MessageSource,
}

/// Classification returned by `/predict`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Prediction {
    pub priority: Priority,
    pub context: MessageContext,
    #[serde(default)]
    pub confidence: Option<f64>,
}

// ============================================
// Analytics
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ContextSlice {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PriorityBucket {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub very_urgent: u64,
    #[serde(default)]
    pub important: u64,
    #[serde(default)]
    pub not_important: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeedbackBucket {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub correct: u64,
    #[serde(default)]
    pub incorrect: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VolumeBucket {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub messages: u64,
}

/// Analytics snapshot for a time range
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsData {
    pub context_data: Vec<ContextSlice>,
    pub priority_data: Vec<PriorityBucket>,
    pub feedback_data: Vec<FeedbackBucket>,
    pub message_volume_data: Vec<VolumeBucket>,
    pub total_messages: u64,
    pub urgent_messages: u64,
    pub accuracy_rate: f64,
}

/// Dashboard counters; the backend decides which keys exist
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DashboardStats {
    pub fields: HashMap<String, serde_json::Value>,
}

impl DashboardStats {
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(|v| v.as_u64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }
}

/// User settings are an opaque JSON object
pub type UserSettings = serde_json::Map<String, serde_json::Value>;

// ============================================
// Helpers
// ============================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

/// Missing and `null` both read as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn required_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_response_with_numeric_user_id() {
        let response: CredentialResponse = serde_json::from_value(json!({
            "access_token": "T",
            "token_type": "bearer",
            "user": {"id": 12, "name": "Alice", "email": "a@b.com"}
        }))
        .unwrap();

        assert_eq!(response.access_token.as_deref(), Some("T"));
        let user = response.user.unwrap();
        assert_eq!(user.id.as_deref(), Some("12"));
        assert_eq!(user.avatar, None);
    }

    #[test]
    fn test_credential_response_without_token() {
        let response: CredentialResponse =
            serde_json::from_value(json!({"message": "check your inbox"})).unwrap();
        assert!(response.access_token.is_none());
        assert!(response.user.is_none());
    }

    #[test]
    fn test_messages_payload_shapes() {
        let wrapped: MessagesPayload = serde_json::from_value(json!({
            "messages": [{
                "id": "m1",
                "sender": "boss@corp.com",
                "subject": "Deadline",
                "source": "gmail",
                "priority": "very_urgent",
                "context": "business",
                "confidence": 0.92,
                "isRead": true
            }]
        }))
        .unwrap();
        let messages = wrapped.into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].priority, Priority::VeryUrgent);
        assert!(messages[0].is_read);

        let bare: MessagesPayload =
            serde_json::from_value(json!([{"id": 3, "source": "whatsapp"}])).unwrap();
        let messages = bare.into_messages();
        assert_eq!(messages[0].id, "3");
        assert_eq!(messages[0].source, MessageSource::Whatsapp);
        assert_eq!(messages[0].priority, Priority::NotImportant);
    }

    #[test]
    fn test_message_nulls_read_as_defaults() {
        let payload: MessagesPayload = serde_json::from_value(json!({
            "messages": [{
                "id": "m-1",
                "sender": null,
                "subject": "Invoice",
                "priority": null,
                "confidence": null,
                "isRead": null
            }]
        }))
        .unwrap();
        let message = &payload.into_messages()[0];
        assert_eq!(message.subject, "Invoice");
        assert_eq!(message.sender, "");
        assert_eq!(message.priority, Priority::NotImportant);
        assert_eq!(message.confidence, 0.0);
        assert!(!message.is_read);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("very-urgent".parse::<Priority>(), Ok(Priority::VeryUrgent));
        assert_eq!("WhatsApp".parse::<MessageSource>(), Ok(MessageSource::Whatsapp));
        assert_eq!("business".parse::<MessageContext>(), Ok(MessageContext::Business));
        assert!("sms".parse::<MessageSource>().is_err());
        assert_eq!(Priority::NotImportant.to_string(), "not_important");
    }

    #[test]
    fn test_feedback_request_wire_format() {
        let body = serde_json::to_value(FeedbackRequest {
            message_id: "m1",
            corrected_priority: Priority::Important,
            corrected_context: MessageContext::Personal,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "message_id": "m1",
                "corrected_priority": "important",
                "corrected_context": "personal"
            })
        );
    }

    #[test]
    fn test_message_query_pairs() {
        let query = MessageQuery::new()
            .source(MessageSource::Gmail)
            .priority(Priority::VeryUrgent)
            .search("")
            .limit(20);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("source", "gmail".to_string()),
                ("priority", "very_urgent".to_string()),
                ("limit", "20".to_string()),
            ]
        );
        assert!(MessageQuery::default().to_pairs().is_empty());
    }

    #[test]
    fn test_analytics_defaults() {
        let analytics: AnalyticsData =
            serde_json::from_value(json!({"totalMessages": 40, "accuracyRate": 0.87})).unwrap();
        assert_eq!(analytics.total_messages, 40);
        assert_eq!(analytics.urgent_messages, 0);
        assert!(analytics.context_data.is_empty());
    }

    #[test]
    fn test_dashboard_stats_lookup() {
        let stats: DashboardStats =
            serde_json::from_value(json!({"total": 12, "accuracy": 0.5})).unwrap();
        assert_eq!(stats.get_u64("total"), Some(12));
        assert_eq!(stats.get_f64("accuracy"), Some(0.5));
        assert_eq!(stats.get_u64("missing"), None);
    }
}

//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.
//!
//! Request bodies are loose (`Option<Value>` for most fields):
//! a field counts as missing when it is absent, `null`, `false`, `0` or an
//! empty string, and whatever the client sent is stored as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// True unless `value` is null, false, zero or an empty string
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// True if the optional field was sent with a truthy value
pub fn present(value: &Option<Value>) -> bool {
    value.as_ref().map(truthy).unwrap_or(false)
}

/// Non-empty string parameter, `None` otherwise
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

// ============================================
// COMMON DTOs
// ============================================

/// `{"message": "..."}` acknowledgement
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{"success": true, "message": "..."}` acknowledgement
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Readiness probe response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub store: String,
    pub backend: String,
    pub uptime_seconds: u64,
    pub version: String,
}

// ============================================
// CHAT DTOs
// ============================================

/// `GET /api/chat` query
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
}

/// `POST /api/chat/send` body
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default, rename = "chatId")]
    pub chat_id: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// `POST /api/chat/report` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default)]
    pub chat_id: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub reporter: Option<Value>,
    #[serde(default)]
    pub reason: Option<Value>,
    #[serde(default)]
    pub reporter_username: Option<Value>,
    #[serde(default)]
    pub reported_user_id: Option<Value>,
    #[serde(default)]
    pub reported_username: Option<Value>,
}

// ============================================
// PROFILE DTOs
// ============================================

/// `?userID=` query used by several routes
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// `POST /api/profile` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProfileRequest {
    #[serde(default, rename = "userID")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub intro: Option<Value>,
    #[serde(default)]
    pub age_range: Option<Value>,
    #[serde(default)]
    pub hobbies: Option<Value>,
    #[serde(default)]
    pub timezone: Option<Value>,
    #[serde(default)]
    pub language: Option<Value>,
    #[serde(default)]
    pub country: Option<Value>,
    #[serde(default)]
    pub favorites: Option<Value>,
    #[serde(default)]
    pub facts: Option<Value>,
    #[serde(default)]
    pub sayings: Option<Value>,
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub avatar_url: Option<Value>,
    #[serde(default)]
    pub country_code: Option<Value>,
    #[serde(default)]
    pub language_code: Option<Value>,
}

/// `POST /api/profile/avatar` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarRequest {
    #[serde(default, rename = "userID")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub avatar_url: Option<Value>,
}

/// `POST /api/profile/edit` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProfileRequest {
    #[serde(default, rename = "userID")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub intro: Option<Value>,
    #[serde(default)]
    pub age_range: Option<Value>,
    #[serde(default)]
    pub hobbies: Option<Value>,
    #[serde(default)]
    pub region: Option<Value>,
    #[serde(default)]
    pub languages: Option<Value>,
    #[serde(default)]
    pub sayings: Option<Value>,
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub avatar_url: Option<Value>,
    #[serde(default)]
    pub country: Option<Value>,
}

/// One entry of `GET /api/facts`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactEntry {
    pub age_range: Option<Value>,
    pub hobbies: Option<Value>,
    pub timezone: Option<Value>,
    pub language: Option<Value>,
}

// ============================================
// MATCHMAKING DTOs
// ============================================

/// `GET /api/matchmaking` query
#[derive(Debug, Deserialize)]
pub struct MatchmakingQuery {
    pub timezone: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "excludeUserID")]
    pub exclude_user_id: Option<String>,
}

/// `POST /api/match` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(default)]
    pub user_a: Option<String>,
    #[serde(default)]
    pub user_b: Option<String>,
}

/// `POST /api/match` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub message: String,
    pub chat_id: String,
}

// ============================================
// MODERATION DTOs
// ============================================

/// `GET /api/reports` response
#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub success: bool,
    pub data: Vec<Value>,
}

// ============================================
// USER DTOs
// ============================================

/// `POST /api/user/ip` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIpRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// `POST /api/blockUser` body
#[derive(Debug, Deserialize)]
pub struct BlockUserRequest {
    #[serde(default, rename = "userID")]
    pub user_id: Option<String>,
}

/// `GET /api/blocked/:userID` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedStatus {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<Value>,
}

// ============================================
// STATS DTOs
// ============================================

/// `GET /api/stats` response
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_letters: usize,
    pub active_pen_pals: usize,
    pub countries_connected: usize,
    pub average_response_time: String,
    pub letters_this_month: usize,
    pub favorite_letters: usize,
    pub activity: Vec<ActivityEntry>,
}

/// Kind of a recent-activity entry
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Sent,
    Received,
    Match,
}

/// One recent-activity entry
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<[String; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_username: Option<String>,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

/// Copy `value` into `map` under `key` when it was sent at all
pub fn insert_if_sent(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v);
    }
}

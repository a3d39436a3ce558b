//! Chat threads, messages and moderation reports

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message in a chat thread
///
/// Decoding accepts any JSON value. `sender` and `text` fall back to the
/// value's string form, `deliveryTime` is kept exactly as stored, and every
/// other key is carried in `extra` so a fetched message re-serializes
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct ChatMessage {
    /// User id of the author
    pub sender: String,
    pub text: String,
    /// Milliseconds since the epoch when written by this crate
    #[serde(skip_serializing_if = "Value::is_null")]
    pub delivery_time: Value,
    /// Fields written by other clients, such as `sentAt` or `delaySeconds`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>, delivery_time: i64) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            delivery_time: Value::from(delivery_time),
            extra: Map::new(),
        }
    }

    /// Message stamped with the current time
    pub fn now(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender, text, chrono::Utc::now().timestamp_millis())
    }

    /// Attach an extra field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Delivery time as whole milliseconds.
    ///
    /// Fractional numbers are truncated and RFC 3339 strings are parsed;
    /// anything else reads as 0.
    pub fn delivery_millis(&self) -> i64 {
        match &self.delivery_time {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<f64>()
                    .map(|f| f as i64)
                    .or_else(|_| {
                        chrono::DateTime::parse_from_rfc3339(s).map(|dt| dt.timestamp_millis())
                    })
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }
}

impl From<Value> for ChatMessage {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("text".to_string(), other);
                map
            }
        };
        Self {
            sender: take_string(&mut fields, "sender"),
            text: take_string(&mut fields, "text"),
            delivery_time: fields.remove("deliveryTime").unwrap_or(Value::Null),
            extra: fields,
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// A chat document: the full history of one two-party thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub users: Vec<String>,
    /// Messages in append order. Append order is arrival order at the
    /// store, not delivery order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
}

impl Chat {
    /// Messages sorted by delivery time
    pub fn messages_by_delivery(&self) -> Vec<&ChatMessage> {
        let mut sorted: Vec<&ChatMessage> = self.messages.iter().collect();
        sorted.sort_by_key(|m| m.delivery_millis());
        sorted
    }

    /// The other participant, if this chat has one besides `user_id`
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        self.users
            .iter()
            .map(String::as_str)
            .find(|u| *u != user_id)
    }
}

/// Report of a chat message, as submitted to `POST /api/chat/report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub chat_id: String,
    /// The offending message, usually the full message object
    pub message: Value,
    /// User id of the reporter
    pub reporter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_username: Option<String>,
}

impl NewReport {
    /// Report a message; the reported user is taken from its sender
    pub fn for_message(
        chat_id: impl Into<String>,
        message: &ChatMessage,
        reporter: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            message: serde_json::to_value(message).unwrap_or(Value::Null),
            reporter: reporter.into(),
            reason: None,
            reporter_username: None,
            reported_user_id: Some(message.sender.clone()),
            reported_username: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Id shared by the match and chat documents of two users: the sorted
/// pair joined by `_`
pub fn match_key(user_a: &str, user_b: &str) -> String {
    let mut pair = [user_a, user_b];
    pair.sort_unstable();
    pair.join("_")
}

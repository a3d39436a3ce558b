//! Stats Routes
//!
//! Lightweight activity metrics computed from a user's chats.
//!
//! - GET /api/stats?userID= - Letter counts, response time, recent activity

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::api::dto::{ActivityEntry, ActivityKind, StatsResponse, UserQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{Document, CHATS, PROFILES};

/// Number of activity entries returned
const RECENT_ACTIVITY: usize = 5;

const MS_PER_HOUR: f64 = 1000.0 * 60.0 * 60.0;

/// GET /api/stats?userID=
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing userID"))?;

    let chats = state
        .store
        .find_array_contains(CHATS, "users", &Value::String(user_id.clone()))
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Error fetching stats");
            e
        })?;

    let mut usernames = HashMap::new();
    for chat in &chats {
        if let Some(partner) = partner_in(chat, &user_id) {
            if usernames.contains_key(partner) {
                continue;
            }
            let name = state
                .store
                .get(PROFILES, partner)
                .await?
                .and_then(|doc| doc.str_field("username").map(str::to_string));
            usernames.insert(partner.to_string(), name);
        }
    }

    let stats = compute_stats(&user_id, &chats, &usernames, Utc::now().timestamp_millis());
    Ok(Json(stats))
}

/// First user of the chat other than `user_id`
fn partner_in<'a>(chat: &'a Document, user_id: &str) -> Option<&'a str> {
    chat.field("users")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_str)
        .find(|u| *u != user_id)
}

fn millis(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// Compute stats for `user_id` over `chats`.
///
/// `usernames` maps partner ids to their username when their profile has
/// one; `now` stamps match entries of chats without `createdAt`.
pub fn compute_stats(
    user_id: &str,
    chats: &[Document],
    usernames: &HashMap<String, Option<String>>,
    now: i64,
) -> StatsResponse {
    let mut total_letters = 0;
    let mut partners: HashSet<&str> = HashSet::new();
    let mut activity = Vec::new();
    let mut response_times: Vec<i64> = Vec::new();

    for chat in chats {
        if let Some(messages) = chat.field("messages").and_then(Value::as_array) {
            let mut sorted: Vec<&Value> = messages.iter().collect();
            sorted.sort_by_key(|m| millis(m.get("deliveryTime")));

            // Partner message followed directly by the user's reply
            for pair in sorted.windows(2) {
                let (current, next) = (pair[0], pair[1]);
                let current_sender = current.get("sender").and_then(Value::as_str);
                let next_sender = next.get("sender").and_then(Value::as_str);
                if current_sender != Some(user_id) && next_sender == Some(user_id) {
                    let diff = millis(next.get("deliveryTime")) - millis(current.get("deliveryTime"));
                    if diff > 0 {
                        response_times.push(diff);
                    }
                }
            }

            for message in sorted {
                let sent = message.get("sender").and_then(Value::as_str) == Some(user_id);
                if sent {
                    total_letters += 1;
                }
                activity.push(ActivityEntry {
                    kind: if sent {
                        ActivityKind::Sent
                    } else {
                        ActivityKind::Received
                    },
                    text: message.get("text").cloned(),
                    sender: message.get("sender").cloned(),
                    users: None,
                    other_username: None,
                    timestamp: millis(message.get("deliveryTime")),
                });
            }
        }

        if let Some(partner) = partner_in(chat, user_id) {
            partners.insert(partner);
            let other_username = usernames
                .get(partner)
                .cloned()
                .flatten()
                .unwrap_or_else(|| partner.to_string());
            let created_at = chat.field("createdAt").filter(|v| v.is_number());
            activity.push(ActivityEntry {
                kind: ActivityKind::Match,
                text: None,
                sender: None,
                users: Some([user_id.to_string(), partner.to_string()]),
                other_username: Some(other_username),
                timestamp: created_at.map(|v| millis(Some(v))).unwrap_or(now),
            });
        }
    }

    activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    activity.truncate(RECENT_ACTIVITY);

    StatsResponse {
        total_letters,
        active_pen_pals: partners.len(),
        countries_connected: partners.len(),
        average_response_time: format_response_time(&response_times),
        letters_this_month: total_letters,
        favorite_letters: 0,
        activity,
    }
}

/// `"N/A"`, `"x.y hours"` under a day, `"x.y days"` otherwise
fn format_response_time(response_times: &[i64]) -> String {
    if response_times.is_empty() {
        return "N/A".to_string();
    }
    let avg_ms = response_times.iter().sum::<i64>() as f64 / response_times.len() as f64;
    let avg_hours = avg_ms / MS_PER_HOUR;
    if avg_hours < 24.0 {
        format!("{:.1} hours", avg_hours)
    } else {
        format!("{:.1} days", avg_hours / 24.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: i64 = 3_600_000;

    fn chat(id: &str, body: Value) -> Document {
        match body {
            Value::Object(map) => Document::new(id, map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(&[]), "N/A");
        assert_eq!(format_response_time(&[HOUR, 2 * HOUR]), "1.5 hours");
        assert_eq!(format_response_time(&[48 * HOUR]), "2.0 days");
    }

    #[test]
    fn test_compute_stats() {
        let chats = vec![chat(
            "a_b",
            json!({
                "users": ["a", "b"],
                "createdAt": 1,
                "messages": [
                    {"sender": "a", "text": "reply", "deliveryTime": 3 * HOUR},
                    {"sender": "b", "text": "hello", "deliveryTime": HOUR},
                    {"sender": "a", "text": "again", "deliveryTime": 4 * HOUR}
                ]
            }),
        )];
        let usernames: HashMap<String, Option<String>> =
            [("b".to_string(), Some("lazyfrog685".to_string()))].into_iter().collect();

        let stats = compute_stats("a", &chats, &usernames, 99);

        assert_eq!(stats.total_letters, 2);
        assert_eq!(stats.letters_this_month, 2);
        assert_eq!(stats.active_pen_pals, 1);
        assert_eq!(stats.average_response_time, "2.0 hours");
        assert_eq!(stats.activity.len(), 4);
        assert_eq!(stats.activity[0].text, Some(json!("again")));
        assert_eq!(stats.activity[0].kind, ActivityKind::Sent);
        let last = stats.activity.last().unwrap();
        assert_eq!(last.kind, ActivityKind::Match);
        assert_eq!(last.other_username.as_deref(), Some("lazyfrog685"));
    }

    #[test]
    fn test_compute_stats_limits_activity() {
        let messages: Vec<Value> = (0..10)
            .map(|i| json!({"sender": "b", "text": format!("m{}", i), "deliveryTime": i}))
            .collect();
        let chats = vec![chat("a_b", json!({"users": ["a", "b"], "messages": messages}))];

        let stats = compute_stats("a", &chats, &HashMap::new(), 1_000);

        assert_eq!(stats.total_letters, 0);
        assert_eq!(stats.activity.len(), 5);
        // Match entry falls back to `now` and sorts first
        assert_eq!(stats.activity[0].kind, ActivityKind::Match);
        assert_eq!(stats.activity[0].other_username.as_deref(), Some("b"));
        assert_eq!(stats.activity[1].text, Some(json!("m9")));
    }
}

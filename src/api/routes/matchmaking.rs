//! Matchmaking Routes
//!
//! - GET /api/matchmaking - Random compatible user
//! - POST /api/match - Create the match and chat between two users

use axum::{
    extract::{Query, State},
    Json,
};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::api::dto::{non_empty, MatchRequest, MatchResponse, MatchmakingQuery};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::match_key;
use crate::store::{Document, SetMode, WriteSet, CHATS, MATCHES, PROFILES};

/// Filters for picking a partner
#[derive(Debug, Default)]
pub struct MatchFilter<'a> {
    pub timezone: Option<&'a str>,
    pub language: Option<&'a str>,
    pub exclude_user_id: Option<&'a str>,
}

impl MatchFilter<'_> {
    /// True if `profile` is a candidate. `matched` holds everyone already
    /// matched with the excluded user.
    pub fn accepts(&self, profile: &Document, matched: &HashSet<String>) -> bool {
        let user_id = profile.str_field("userID");

        if let Some(excluded) = self.exclude_user_id {
            if user_id == Some(excluded) {
                return false;
            }
            if user_id.map(|id| matched.contains(id)).unwrap_or(false) {
                return false;
            }
        }

        if let Some(timezone) = self.timezone {
            if profile.str_field("timezone") != Some(timezone) {
                return false;
            }
        }

        if let Some(language) = self.language {
            let speaks = match profile.field("language") {
                Some(Value::String(l)) => l == language,
                Some(Value::Array(ls)) => ls.iter().any(|l| l.as_str() == Some(language)),
                _ => false,
            };
            if !speaks {
                return false;
            }
        }

        true
    }
}

/// GET /api/matchmaking?timezone=&language=&excludeUserID=
///
/// Scans every profile and picks one candidate uniformly at random.
pub async fn find_match(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchmakingQuery>,
) -> ApiResult<Json<Value>> {
    let filter = MatchFilter {
        timezone: non_empty(&query.timezone),
        language: non_empty(&query.language),
        exclude_user_id: non_empty(&query.exclude_user_id),
    };
    if filter.timezone.is_none() && filter.language.is_none() {
        return Err(ApiError::bad_request(
            "At least one of timezone or language is required",
        ));
    }

    let mut matched = HashSet::new();
    if let Some(excluded) = filter.exclude_user_id {
        let matches = state
            .store
            .find_array_contains(MATCHES, "users", &json!(excluded))
            .await?;
        for doc in matches {
            let users = doc.field("users").and_then(Value::as_array);
            for uid in users.into_iter().flatten().filter_map(Value::as_str) {
                if uid != excluded {
                    matched.insert(uid.to_string());
                }
            }
        }
    }

    let profiles = state.store.list(PROFILES).await?;
    let candidates: Vec<Document> = profiles
        .into_iter()
        .filter(|doc| filter.accepts(doc, &matched))
        .collect();

    let picked = candidates.choose(&mut rand::thread_rng()).cloned();
    match picked {
        Some(doc) => {
            tracing::debug!(candidates = candidates.len(), user_id = ?doc.str_field("userID"), "Match found");
            Ok(Json(doc.into_value()))
        }
        None => Err(ApiError::not_found("No users found for the given filters")),
    }
}

/// POST /api/match
///
/// Record the match, create the chat if it does not exist yet, and link
/// both profiles to the chat and to each other.
pub async fn create_match(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MatchRequest>,
) -> ApiResult<Json<MatchResponse>> {
    let (user_a, user_b) = match (non_empty(&req.user_a), non_empty(&req.user_b)) {
        (Some(a), Some(b)) => (a.to_string(), b.to_string()),
        _ => return Err(ApiError::bad_request("Missing user IDs")),
    };

    let key = match_key(&user_a, &user_b);
    let users = json!([user_a, user_b]);
    let store = &state.store;

    store
        .set(
            MATCHES,
            &key,
            WriteSet::new()
                .set("users", users.clone())
                .server_timestamp("timestamp"),
            SetMode::Overwrite,
        )
        .await?;

    let created = store
        .create(
            CHATS,
            &key,
            WriteSet::new()
                .set("chatId", key.clone())
                .set("users", users.clone())
                .set("messages", json!([]))
                .server_timestamp("createdAt"),
        )
        .await?;
    // An existing history must survive a re-match.
    if !created {
        store
            .set(
                CHATS,
                &key,
                WriteSet::new()
                    .set("chatId", key.clone())
                    .set("users", users.clone()),
                SetMode::Merge,
            )
            .await?;
    }

    for (owner, partner) in [(&user_a, &user_b), (&user_b, &user_a)] {
        store
            .set(
                PROFILES,
                owner,
                WriteSet::new()
                    .array_union("chats", vec![json!(key)])
                    .array_union("MatchedUsers", vec![json!(partner)]),
                SetMode::Merge,
            )
            .await?;
    }

    tracing::info!(chat_id = %key, "Match and chat created");

    Ok(Json(MatchResponse {
        message: "Match and chat created".to_string(),
        chat_id: key,
    }))
}

//! User Administration Routes
//!
//! - POST /api/user/ip - Store a user's IP address for audit
//! - POST /api/blockUser - Block a user
//! - GET /api/blocked/:userID - Block status

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::{
    non_empty, truthy, BlockUserRequest, BlockedStatus, MessageResponse, SuccessResponse,
    UserIpRequest,
};
use crate::api::error::{ApiError, ApiResult, ModerationError};
use crate::api::state::AppState;
use crate::store::{SetMode, WriteSet, BLOCKED_USERS, PROFILES, USERS};

/// POST /api/user/ip
///
/// Store failures answer with a generic message rather than the raw error.
pub async fn store_ip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserIpRequest>,
) -> Response {
    let Some(uid) = non_empty(&req.uid) else {
        return ApiError::bad_request("Missing user ID").into_response();
    };
    let ip = non_empty(&req.ip_address).unwrap_or("unknown");

    match state
        .store
        .set(USERS, uid, WriteSet::new().set("ipAddress", ip), SetMode::Merge)
        .await
    {
        Ok(()) => Json(MessageResponse::new("IP address stored successfully")).into_response(),
        Err(e) => {
            tracing::error!(uid = %uid, error = %e, "Error storing IP address");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Internal server error")),
            )
                .into_response()
        }
    }
}

/// POST /api/blockUser
///
/// Flags the profile and records the user in `blocked_users`. No auth
/// provider is attached, so `email` is always null.
pub async fn block_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BlockUserRequest>,
) -> Result<Json<SuccessResponse>, ModerationError> {
    let user_id = non_empty(&req.user_id)
        .ok_or_else(|| ApiError::bad_request("Missing userID"))?
        .to_string();
    let blocked_at = Utc::now().timestamp_millis();

    state
        .store
        .set(
            PROFILES,
            &user_id,
            WriteSet::new()
                .set("userID", user_id.clone())
                .set("blocked", true)
                .set("blockedAt", blocked_at)
                .set("blockedEmail", Value::Null),
            SetMode::Merge,
        )
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Error blocking user");
            e
        })?;

    state
        .store
        .set(
            BLOCKED_USERS,
            &user_id,
            WriteSet::new()
                .set("userID", user_id.clone())
                .set("email", Value::Null)
                .set("blockedAt", blocked_at)
                .set("source", "admin_action"),
            SetMode::Merge,
        )
        .await?;

    tracing::info!(user_id = %user_id, "User blocked");
    Ok(Json(SuccessResponse::ok("User blocked.")))
}

/// GET /api/blocked/:userID
///
/// `blocked_users` wins; the profile flag is the fallback.
pub async fn blocked_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BlockedStatus>> {
    if user_id.is_empty() {
        return Err(ApiError::bad_request("Missing userID"));
    }

    if let Some(doc) = state.store.get(BLOCKED_USERS, &user_id).await? {
        return Ok(Json(BlockedStatus {
            blocked: true,
            source: Some(
                doc.str_field("source")
                    .filter(|s| !s.is_empty())
                    .unwrap_or("admin_action")
                    .to_string(),
            ),
            blocked_at: Some(doc.field("blockedAt").cloned().unwrap_or(Value::Null)),
        }));
    }

    if let Some(profile) = state.store.get(PROFILES, &user_id).await? {
        let flagged = profile
            .field("blocked")
            .map(truthy)
            .unwrap_or(false);
        if flagged {
            return Ok(Json(BlockedStatus {
                blocked: true,
                source: Some("profile_flag".to_string()),
                blocked_at: Some(profile.field("blockedAt").cloned().unwrap_or(Value::Null)),
            }));
        }
    }

    Ok(Json(BlockedStatus {
        blocked: false,
        source: None,
        blocked_at: None,
    }))
}

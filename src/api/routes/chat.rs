//! Chat Routes
//!
//! Endpoints for reading chat threads, appending messages and reporting
//! messages for moderation.
//!
//! - GET /api/chat?chatId= - Fetch a chat document
//! - POST /api/chat/send - Append a message
//! - POST /api/chat/report - File a moderation report

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::dto::{
    insert_if_sent, present, truthy, ChatQuery, MessageResponse, ReportRequest,
    SendMessageRequest,
};
use crate::api::error::{ApiError, ApiResult, StackedError};
use crate::api::state::AppState;
use crate::store::{WriteSet, CHATS, REPORTS};

/// GET /api/chat?chatId=
///
/// Return the stored chat document unchanged.
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Json<Value>> {
    let chat_id = query
        .chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing chatId"))?;

    let doc = state
        .store
        .get(CHATS, &chat_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Chat not found"))?;

    Ok(Json(doc.into_value()))
}

/// POST /api/chat/send
///
/// Array-union the message into the chat's `messages`. A deep-equal
/// message is stored once; the chat must already exist.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let (chat_id, message) = validate_send_request(req)?;

    state
        .store
        .update(
            CHATS,
            &chat_id,
            WriteSet::new().array_union("messages", vec![Value::Object(message)]),
        )
        .await?;

    tracing::debug!(chat_id = %chat_id, "Message appended");

    Ok(Json(MessageResponse::new("Message sent successfully")))
}

/// POST /api/chat/report
///
/// Insert a new report stamped with the current time.
pub async fn report_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<MessageResponse>, StackedError> {
    let expose_stack = state.config.expose_error_stack;
    let stacked = |error: ApiError| StackedError {
        error,
        expose_stack,
    };

    let report = build_report(req, Utc::now().timestamp_millis()).map_err(stacked)?;
    let chat_id = report.get("chatId").cloned().unwrap_or(Value::Null);

    match state.store.add(REPORTS, WriteSet::from_map(report)).await {
        Ok(report_id) => {
            tracing::info!(report_id = %report_id, chat_id = %chat_id, "Report submitted");
            Ok(Json(MessageResponse::new("Report submitted successfully")))
        }
        Err(e) => {
            tracing::error!(error = %e, chat_id = %chat_id, "Error saving report");
            Err(stacked(ApiError::from(e)))
        }
    }
}

/// Check the send body and split it into chat id and message object
fn validate_send_request(req: SendMessageRequest) -> ApiResult<(String, Map<String, Value>)> {
    let missing = || ApiError::bad_request("Missing required fields (chatId, message)");

    let chat_id = match req.chat_id {
        Some(Value::String(id)) if !id.is_empty() => id,
        Some(Value::Number(n)) if truthy(&Value::Number(n.clone())) => n.to_string(),
        _ => return Err(missing()),
    };

    let message = match req.message {
        Some(Value::Object(message)) => message,
        _ => return Err(missing()),
    };

    let complete = ["sender", "text", "deliveryTime"]
        .iter()
        .all(|field| message.get(*field).map(truthy).unwrap_or(false));
    if !complete {
        return Err(missing());
    }

    Ok((chat_id, message))
}

/// Check the report body and build the report document
fn build_report(req: ReportRequest, reported_at: i64) -> ApiResult<Map<String, Value>> {
    if !present(&req.chat_id) || !present(&req.message) || !present(&req.reporter) {
        return Err(ApiError::bad_request(
            "Missing required fields (chatId, message, reporter)",
        ));
    }

    let reason = req
        .reason
        .filter(truthy)
        .unwrap_or_else(|| Value::String(String::new()));

    let mut report = Map::new();
    insert_if_sent(&mut report, "chatId", req.chat_id);
    insert_if_sent(&mut report, "message", req.message);
    insert_if_sent(&mut report, "reporter", req.reporter);
    report.insert("reason".to_string(), reason);
    report.insert("reportedAt".to_string(), Value::from(reported_at));
    insert_if_sent(&mut report, "reporterUsername", req.reporter_username);
    insert_if_sent(&mut report, "reportedUserId", req.reported_user_id);
    insert_if_sent(&mut report, "reportedUsername", req.reported_username);

    Ok(report)
}

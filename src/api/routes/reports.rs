//! Moderation Routes
//!
//! List reports and resolve or reject them. Responses carry `success`.
//!
//! - GET /api/reports - All reports
//! - POST /api/reports/:id/validate - Resolve and record a violation
//! - POST /api/reports/:id/invalidate - Reject

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::dto::{ReportsResponse, SuccessResponse};
use crate::api::error::{ApiError, ModerationError};
use crate::api::state::AppState;
use crate::store::{Document, SetMode, WriteSet, PROFILES, REPORTS};

/// Longest message excerpt kept in a violation entry, in characters
const MAX_VIOLATION_TEXT: usize = 500;

/// GET /api/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportsResponse>, ModerationError> {
    let reports = state.store.list(REPORTS).await?;
    let data = reports
        .into_iter()
        .map(|doc| doc.into_value_with_id(&["id", "_id"]))
        .collect();

    Ok(Json(ReportsResponse {
        success: true,
        data,
    }))
}

/// POST /api/reports/:id/validate
///
/// Mark the report resolved, then count a violation against the reported
/// user. A failed profile update is logged and does not fail the request.
pub async fn validate_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ModerationError> {
    let report = state
        .store
        .get(REPORTS, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;

    let validated_at = Utc::now().timestamp_millis();
    state
        .store
        .set(
            REPORTS,
            &id,
            WriteSet::new()
                .set("status", "resolved")
                .set("validatedAt", validated_at),
            SetMode::Merge,
        )
        .await?;

    if let Some(reported_user) = reported_user_id(&report) {
        let violation = violation_entry(&id, &report, validated_at);
        let result = state
            .store
            .set(
                PROFILES,
                &reported_user,
                WriteSet::new()
                    .set("userID", reported_user.clone())
                    .increment("violationCount", 1)
                    .array_union("violations", vec![violation]),
                SetMode::Merge,
            )
            .await;
        match result {
            Ok(()) => tracing::info!(report_id = %id, user_id = %reported_user, "Violation recorded"),
            Err(e) => tracing::error!(
                report_id = %id,
                user_id = %reported_user,
                error = %e,
                "Error updating reported user profile with violation"
            ),
        }
    }

    Ok(Json(SuccessResponse::ok(
        "Report marked as valid (resolved) and violation recorded.",
    )))
}

/// POST /api/reports/:id/invalidate
pub async fn invalidate_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ModerationError> {
    state
        .store
        .set(
            REPORTS,
            &id,
            WriteSet::new().set("status", "rejected"),
            SetMode::Merge,
        )
        .await?;

    Ok(Json(SuccessResponse::ok("Report marked as invalid (rejected).")))
}

/// Sender of the reported message, else the explicit `reportedUserId`
fn reported_user_id(report: &Document) -> Option<String> {
    report
        .field("message")
        .and_then(|m| m.get("sender"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| report.str_field("reportedUserId").filter(|s| !s.is_empty()))
        .map(str::to_string)
}

/// Violation record appended to the reported user's profile
fn violation_entry(report_id: &str, report: &Document, validated_at: i64) -> Value {
    let message_text: String = report
        .field("message")
        .and_then(|m| m.get("text"))
        .map(|text| match text {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
        .chars()
        .take(MAX_VIOLATION_TEXT)
        .collect();

    json!({
        "reportId": report_id,
        "reason": report.field("reason").cloned().unwrap_or_else(|| json!("")),
        "chatId": report.field("chatId").cloned().unwrap_or(Value::Null),
        "messageText": message_text,
        "reporter": report.field("reporter").cloned().unwrap_or(Value::Null),
        "reportedAt": report.field("reportedAt").cloned().unwrap_or(Value::Null),
        "validatedAt": validated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(body: Value) -> Document {
        match body {
            Value::Object(map) => Document::new("r1", map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_reported_user_prefers_sender() {
        let r = report(json!({
            "message": {"sender": "u2", "text": "x"},
            "reportedUserId": "u3"
        }));
        assert_eq!(reported_user_id(&r).as_deref(), Some("u2"));

        let r = report(json!({"message": "plain text", "reportedUserId": "u3"}));
        assert_eq!(reported_user_id(&r).as_deref(), Some("u3"));

        let r = report(json!({"message": "plain text"}));
        assert_eq!(reported_user_id(&r), None);
    }

    #[test]
    fn test_violation_entry_truncates_text() {
        let long_text = "a".repeat(600);
        let r = report(json!({
            "chatId": "a_b",
            "message": {"sender": "u2", "text": long_text},
            "reporter": "u1",
            "reportedAt": 10
        }));
        let entry = violation_entry("r1", &r, 20);
        assert_eq!(entry["messageText"].as_str().unwrap().len(), 500);
        assert_eq!(entry["reason"], "");
        assert_eq!(entry["chatId"], "a_b");
        assert_eq!(entry["validatedAt"], 20);
    }
}

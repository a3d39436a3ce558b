//! GlobeTalk REST API
//!
//! HTTP API layer for GlobeTalk, built with Axum. Every route lives under
//! `/api`; anything else answers 404 `{"error": "Not found"}`.
//!
//! # Endpoints
//!
//! ## Chat
//! - `GET /api/chat?chatId=` - Fetch a chat
//! - `POST /api/chat/send` - Append a message
//! - `POST /api/chat/report` - Report a message
//!
//! ## Profiles
//! - `POST /api/profile` - Create or update a profile
//! - `GET /api/profile?userID=` - Fetch a profile
//! - `GET /api/facts` - Basic attributes of every profile
//! - `POST /api/profile/avatar` - Save avatar and username
//! - `POST /api/profile/edit` - Edit profile fields
//! - `GET /api/available_languages` - Language reference list
//! - `GET /api/available_timezones` - Timezone reference list
//! - `GET /api/matchedUsers?userID=` - Partner timezones
//!
//! ## Matchmaking
//! - `GET /api/matchmaking` - Random compatible user
//! - `POST /api/match` - Create a match and its chat
//!
//! ## Moderation
//! - `GET /api/reports` - List reports
//! - `POST /api/reports/:id/validate` - Resolve a report
//! - `POST /api/reports/:id/invalidate` - Reject a report
//!
//! ## Users
//! - `POST /api/user/ip` - Record a user's IP address
//! - `POST /api/blockUser` - Block a user
//! - `GET /api/blocked/:userID` - Block status
//!
//! ## Stats & Health
//! - `GET /api/stats?userID=` - Activity metrics
//! - `GET /api/health` - Liveness
//! - `GET /api/health/ready` - Readiness probe
//!
//! # Example
//!
//! ```rust,ignore
//! use globetalk::api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::in_memory(config.clone());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    let api_routes = Router::new()
        // Chat routes
        .route("/chat", get(routes::chat::get_chat))
        .route("/chat/send", post(routes::chat::send_message))
        .route("/chat/report", post(routes::chat::report_message))
        // Profile routes
        .route(
            "/profile",
            get(routes::profile::get_profile).post(routes::profile::save_profile),
        )
        .route("/facts", get(routes::profile::list_facts))
        .route("/profile/avatar", post(routes::profile::save_avatar))
        .route("/profile/edit", post(routes::profile::edit_profile))
        .route("/available_languages", get(routes::profile::available_languages))
        .route("/available_timezones", get(routes::profile::available_timezones))
        .route("/matchedUsers", get(routes::profile::matched_users))
        // Matchmaking routes
        .route("/matchmaking", get(routes::matchmaking::find_match))
        .route("/match", post(routes::matchmaking::create_match))
        // Moderation routes
        .route("/reports", get(routes::reports::list_reports))
        .route("/reports/:id/validate", post(routes::reports::validate_report))
        .route("/reports/:id/invalidate", post(routes::reports::invalidate_report))
        // User administration routes
        .route("/user/ip", post(routes::users::store_ip))
        .route("/blockUser", post(routes::users::block_user))
        .route("/blocked/:user_id", get(routes::users::blocked_status))
        // Stats and health
        .route("/stats", get(routes::stats::user_stats))
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::readiness));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api", api_routes)
        .fallback(routes::health::not_found)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let backend = state.store.backend();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(store = backend, "GlobeTalk API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("GlobeTalk API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        Document, DocumentStore, MemoryStore, SetMode, StoreError, StoreResult, WriteSet, CHATS,
        PROFILES, REPORTS,
    };
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    async fn create_test_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                CHATS,
                "c1",
                WriteSet::new()
                    .set("users", json!(["u1", "u2"]))
                    .set(
                        "messages",
                        json!([{"sender": "u2", "text": "hello", "deliveryTime": 1}]),
                    ),
                SetMode::Overwrite,
            )
            .await
            .unwrap();

        let state = AppState::new(store.clone(), ApiConfig::default());
        (build_router(state), store)
    }

    /// Store whose every operation fails with an I/O error
    struct FailingStore;

    fn disk_error() -> StoreError {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk unavailable",
        ))
    }

    #[async_trait::async_trait]
    impl DocumentStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _: &str, _: &str) -> StoreResult<Option<Document>> {
            Err(disk_error())
        }

        async fn set(&self, _: &str, _: &str, _: WriteSet, _: SetMode) -> StoreResult<()> {
            Err(disk_error())
        }

        async fn create(&self, _: &str, _: &str, _: WriteSet) -> StoreResult<bool> {
            Err(disk_error())
        }

        async fn update(&self, _: &str, _: &str, _: WriteSet) -> StoreResult<()> {
            Err(disk_error())
        }

        async fn add(&self, _: &str, _: WriteSet) -> StoreResult<String> {
            Err(disk_error())
        }

        async fn list(&self, _: &str) -> StoreResult<Vec<Document>> {
            Err(disk_error())
        }
    }

    fn failing_app(expose_error_stack: bool) -> Router {
        let config = ApiConfig {
            expose_error_stack,
            ..Default::default()
        };
        build_router(AppState::new(Arc::new(FailingStore), config))
    }

    fn report_body() -> Value {
        json!({
            "chatId": "c1",
            "message": {"sender": "u2", "text": "rude", "deliveryTime": 1},
            "reporter": "u1"
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn messages(store: &MemoryStore, chat_id: &str) -> Vec<Value> {
        let doc = store.get(CHATS, chat_id).await.unwrap().unwrap();
        doc.field("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = create_test_app().await;

        let response = app.oneshot(get("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _) = create_test_app().await;

        let response = app.oneshot(get("/api/health/ready")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["backend"], "memory");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = create_test_app().await;

        let response = app.oneshot(get("/api/nope")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn test_get_chat_returns_document() {
        let (app, _) = create_test_app().await;

        let response = app.oneshot(get("/api/chat?chatId=c1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["users"], json!(["u1", "u2"]));
        assert_eq!(
            body["messages"],
            json!([{"sender": "u2", "text": "hello", "deliveryTime": 1}])
        );
    }

    #[tokio::test]
    async fn test_get_chat_errors() {
        let (app, _) = create_test_app().await;

        let response = app.clone().oneshot(get("/api/chat")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Missing chatId"}));

        let response = app.oneshot(get("/api/chat?chatId=missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Chat not found"}));
    }

    #[tokio::test]
    async fn test_send_appends_and_dedups() {
        let (app, store) = create_test_app().await;
        let message = json!({"sender": "u1", "text": "hi", "deliveryTime": 2});

        let response = app
            .clone()
            .oneshot(post_json("/api/chat/send", json!({"chatId": "c1", "message": message})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Message sent successfully"})
        );
        assert_eq!(messages(&store, "c1").await.len(), 2);

        // Deep-equal resend is stored once
        let response = app
            .clone()
            .oneshot(post_json("/api/chat/send", json!({"chatId": "c1", "message": message})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(messages(&store, "c1").await.len(), 2);

        // Same text at another time is a new message
        let later = json!({"sender": "u1", "text": "hi", "deliveryTime": 3});
        app.oneshot(post_json("/api/chat/send", json!({"chatId": "c1", "message": later})))
            .await
            .unwrap();
        let stored = messages(&store, "c1").await;
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2], later);
    }

    #[tokio::test]
    async fn test_send_missing_field_writes_nothing() {
        let (app, store) = create_test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/chat/send",
                json!({"chatId": "c1", "message": {"sender": "u1", "text": "", "deliveryTime": 2}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing required fields (chatId, message)"})
        );
        assert_eq!(messages(&store, "c1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_to_missing_chat_fails() {
        let (app, store) = create_test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/chat/send",
                json!({"chatId": "nope", "message": {"sender": "u1", "text": "x", "deliveryTime": 2}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
        assert!(store.get(CHATS, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_report_message() {
        let (app, store) = create_test_app().await;
        let before = chrono::Utc::now().timestamp_millis();

        let response = app
            .oneshot(post_json(
                "/api/chat/report",
                json!({"chatId": "c1", "message": "hi", "reporter": "u1"}),
            ))
            .await
            .unwrap();
        let after = chrono::Utc::now().timestamp_millis();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Report submitted successfully"})
        );

        let reports = store.list(REPORTS).await.unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.field("chatId"), Some(&json!("c1")));
        assert_eq!(report.field("message"), Some(&json!("hi")));
        assert_eq!(report.field("reason"), Some(&json!("")));
        let reported_at = report.field("reportedAt").and_then(Value::as_i64).unwrap();
        assert!(before <= reported_at && reported_at <= after);
    }

    #[tokio::test]
    async fn test_report_missing_reporter() {
        let (app, store) = create_test_app().await;

        let response = app
            .oneshot(post_json("/api/chat/report", json!({"chatId": "c1", "message": "hi"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Missing required fields (chatId, message, reporter)"
        );
        assert!(store.list(REPORTS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_match_then_chat_flow() {
        let (app, store) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/api/match", json!({"userA": "zed", "userB": "amy"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["chatId"], "amy_zed");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat/send",
                json!({"chatId": "amy_zed", "message": {"sender": "amy", "text": "hey", "deliveryTime": 5}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Re-matching keeps the history
        app.oneshot(post_json("/api/match", json!({"userA": "amy", "userB": "zed"})))
            .await
            .unwrap();
        assert_eq!(messages(&store, "amy_zed").await.len(), 1);

        let amy = store.get(PROFILES, "amy").await.unwrap().unwrap();
        assert_eq!(amy.field("chats"), Some(&json!(["amy_zed"])));
        assert_eq!(amy.field("MatchedUsers"), Some(&json!(["zed"])));
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let (app, _) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/profile",
                json!({
                    "userID": "u1",
                    "intro": "hello",
                    "ageRange": "25-34",
                    "hobbies": ["travel"],
                    "timezone": "(UTC+09:00) Osaka, Sapporo, Tokyo",
                    "language": "Japanese",
                    "country": "Japan"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get("/api/profile?userID=u1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["language"], "Japanese");

        let response = app
            .clone()
            .oneshot(get("/api/matchmaking?language=Japanese&excludeUserID=u9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["userID"], "u1");

        let response = app
            .oneshot(get("/api/matchmaking?language=Xhosa"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_moderation_flow() {
        let (app, store) = create_test_app().await;
        let report_id = store
            .add(
                REPORTS,
                WriteSet::new()
                    .set("chatId", "c1")
                    .set("message", json!({"sender": "u2", "text": "rude"}))
                    .set("reporter", "u1"),
            )
            .await
            .unwrap();

        let response = app.clone().oneshot(get("/api/reports")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][0]["id"], json!(report_id));

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/reports/{}/validate", report_id), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let profile = store.get(PROFILES, "u2").await.unwrap().unwrap();
        assert_eq!(profile.field("violationCount"), Some(&json!(1)));

        let response = app
            .oneshot(post_json("/api/reports/missing/validate", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Report not found"})
        );
    }

    #[tokio::test]
    async fn test_block_user() {
        let (app, _) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/api/blockUser", json!({"userID": "u2"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/blocked/u2")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["blocked"], true);
        assert_eq!(body["source"], "admin_action");
    }

    #[tokio::test]
    async fn test_report_store_failure_includes_stack() {
        let response = failing_app(true)
            .oneshot(post_json("/api/chat/report", report_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "IO error: disk unavailable");
        let stack = body["stack"].as_str().unwrap();
        assert!(stack.contains("caused by: disk unavailable"));
    }

    #[tokio::test]
    async fn test_report_store_failure_without_stack() {
        let response = failing_app(false)
            .oneshot(post_json("/api/chat/report", report_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "IO error: disk unavailable"})
        );
    }

    #[tokio::test]
    async fn test_chat_store_failures_return_raw_message() {
        let app = failing_app(true);

        let response = app.clone().oneshot(get("/api/chat?chatId=c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "IO error: disk unavailable"})
        );

        let send = json!({
            "chatId": "c1",
            "message": {"sender": "u1", "text": "hi", "deliveryTime": 2}
        });
        let response = app
            .clone()
            .oneshot(post_json("/api/chat/send", send))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await.get("stack").is_none());

        let response = app.oneshot(get("/api/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_concurrent_rematch_keeps_sent_messages() {
        let (app, store) = create_test_app().await;
        let pair = json!({"userA": "u3", "userB": "u4"});

        let response = app
            .clone()
            .oneshot(post_json("/api/match", pair.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut handles = Vec::new();
        for i in 0..10 {
            let rematch = app.clone().oneshot(post_json("/api/match", pair.clone()));
            let send = app.clone().oneshot(post_json(
                "/api/chat/send",
                json!({
                    "chatId": "u3_u4",
                    "message": {"sender": "u3", "text": format!("m{}", i), "deliveryTime": i + 1}
                }),
            ));
            handles.push(tokio::spawn(rematch));
            handles.push(tokio::spawn(send));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status(), StatusCode::OK);
        }

        assert_eq!(messages(&store, "u3_u4").await.len(), 10);
    }
}

//! GlobeTalk REST API Client
//!
//! HTTP client for the chat and profile endpoints, used by the CLI and by
//! the chat poller.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::api::dto::HealthResponse;
use crate::model::{Chat, ChatMessage, NewReport, Profile};
use crate::poller::ChatFetcher;

/// Environment variables holding the API base URL, in lookup order
pub const BASE_URL_VARS: [&str; 2] = ["NEXT_PUBLIC_API_URL", "GLOBETALK_API_URL"];

/// GlobeTalk REST API client
#[derive(Debug, Clone)]
pub struct GlobeTalkClient {
    client: Client,
    config: ClientConfig,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g., "http://localhost:5000")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults, with the base URL taken from the environment when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = base_url_from_env() {
            config.base_url = url;
        }
        config
    }
}

/// First non-empty base URL variable
pub fn base_url_from_env() -> Option<String> {
    BASE_URL_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|url| !url.is_empty())
}

impl GlobeTalkClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET /api/health
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.client.get(self.url("health")).send().await?;
        let response = expect_success(response, ClientError::Unavailable)?;
        Ok(response.json().await?)
    }

    /// Fetch the chat document for `chat_id`
    pub async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ClientError> {
        let url = format!(
            "{}?chatId={}",
            self.url("chat"),
            urlencoding::encode(chat_id)
        );
        let response = self.client.get(url).send().await?;
        let response = expect_success(response, ClientError::FetchChat)?;
        Ok(response.json().await?)
    }

    /// Append `message` to the chat
    pub async fn send_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), ClientError> {
        let body = json!({ "chatId": chat_id, "message": message });
        self.post(&self.url("chat/send"), &body, ClientError::SendMessage)
            .await
    }

    /// File a moderation report
    pub async fn report_message(&self, report: &NewReport) -> Result<(), ClientError> {
        self.post(&self.url("chat/report"), report, ClientError::ReportMessage)
            .await
    }

    /// Fetch a user's profile
    pub async fn fetch_profile(&self, user_id: &str) -> Result<Profile, ClientError> {
        let url = format!(
            "{}?userID={}",
            self.url("profile"),
            urlencoding::encode(user_id)
        );
        let response = self.client.get(url).send().await?;
        let response = expect_success(response, ClientError::FetchProfile)?;
        Ok(response.json().await?)
    }

    /// Create or update a profile
    pub async fn save_profile(&self, profile: &Profile) -> Result<(), ClientError> {
        self.post(&self.url("profile"), profile, ClientError::SaveProfile)
            .await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        on_failure: ClientError,
    ) -> Result<(), ClientError> {
        let response = self.client.post(url).json(body).send().await?;
        expect_success(response, on_failure)?;
        Ok(())
    }
}

/// Pass a 2xx response through, otherwise log it and return `on_failure`
fn expect_success(response: Response, on_failure: ClientError) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        tracing::debug!(
            status = response.status().as_u16(),
            url = %response.url(),
            "Request failed"
        );
        Err(on_failure)
    }
}

#[async_trait]
impl ChatFetcher for GlobeTalkClient {
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ClientError> {
        GlobeTalkClient::fetch_chat(self, chat_id).await
    }
}

// ============================================
// Errors
// ============================================

/// Errors returned by the API client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to fetch chat")]
    FetchChat,

    #[error("Failed to send message")]
    SendMessage,

    #[error("Failed to report message")]
    ReportMessage,

    #[error("Failed to fetch user profile")]
    FetchProfile,

    #[error("Failed to save profile")]
    SaveProfile,

    #[error("GlobeTalk backend unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

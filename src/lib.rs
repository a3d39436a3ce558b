//! # GlobeTalk
//!
//! Backend for a pen-pal chat app: two matched users exchange messages in a
//! shared chat document, and either of them can report a message for
//! moderation.
//!
//! ## Modules
//!
//! - [`store`]: Document store with memory and SQLite backends
//! - [`model`]: Chats, messages, reports and profiles
//! - [`api`]: REST API server with Axum
//! - [`client`]: HTTP client for the API
//! - [`poller`]: Interval re-fetch of a chat
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use globetalk::client::{ClientConfig, GlobeTalkClient};
//! use globetalk::model::ChatMessage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GlobeTalkClient::new(ClientConfig::from_env())?;
//!
//!     client
//!         .send_message("userA_userB", &ChatMessage::now("userA", "Hello from Tokyo"))
//!         .await?;
//!
//!     let chat = client.fetch_chat("userA_userB").await?;
//!     for message in chat.messages_by_delivery() {
//!         println!("{}: {}", message.sender, message.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod model;
pub mod poller;
pub mod store;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use client::{ClientConfig, ClientError, GlobeTalkClient};

pub use config::{Config, ConfigError};

pub use model::{Chat, ChatMessage, NewReport, Profile};

pub use poller::{ChatFetcher, ChatPoller, PollerConfig};

pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError, StoreResult};

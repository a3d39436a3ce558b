//! GlobeTalk domain types
//!
//! Typed views of the documents the API serves. The server keeps documents
//! as raw JSON so unknown fields pass through untouched; the client and the
//! poller deserialize into these.

pub mod chat;
pub mod profile;

pub use chat::{match_key, Chat, ChatMessage, NewReport};
pub use profile::{Language, Profile};

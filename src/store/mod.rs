//! GlobeTalk Document Store
//!
//! Collections of JSON documents keyed by id, with the small set of write
//! transforms the backend relies on:
//!
//! - **types**: `Document`, `FieldValue`, `WriteSet`, `SetMode`
//! - **memory**: in-process backend (tests, demos, `store.backend = "memory"`)
//! - **sqlite**: persistent backend on a single SQLite file
//! - **error**: Error types
//!
//! # Write path
//!
//! ```text
//!   WriteSet → lock document → apply transforms (array-union, increment,
//!   server timestamp) → replace body → unlock
//! ```
//!
//! Each write touches exactly one document and is atomic with respect to
//! other writes on the same store. Nothing spans documents.
//!
//! # Example
//!
//! ```rust,no_run
//! use globetalk::store::{DocumentStore, MemoryStore, SetMode, WriteSet};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!
//!     store
//!         .set("chats", "u1_u2", WriteSet::new().set("messages", json!([])), SetMode::Overwrite)
//!         .await?;
//!
//!     store
//!         .update(
//!             "chats",
//!             "u1_u2",
//!             WriteSet::new().array_union("messages", vec![json!({"sender": "u1", "text": "hi"})]),
//!         )
//!         .await?;
//!
//!     let chat = store.get("chats", "u1_u2").await?.expect("chat exists");
//!     println!("{}", chat.data["messages"]);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{Document, FieldValue, SetMode, WriteSet};

use async_trait::async_trait;
use serde_json::Value;

/// Collection holding one document per chat thread
pub const CHATS: &str = "chats";
/// Collection holding user profiles keyed by user id
pub const PROFILES: &str = "profiles";
/// Collection holding moderation reports
pub const REPORTS: &str = "reports";
/// Collection holding matches keyed by the sorted user pair
pub const MATCHES: &str = "matches";
/// Collection holding per-user audit data (IP addresses)
pub const USERS: &str = "users";
/// Collection holding blocked users
pub const BLOCKED_USERS: &str = "blocked_users";
/// Languages seen in profiles
pub const AVAILABLE_LANGUAGES: &str = "available_languages";
/// Timezones seen in profiles
pub const AVAILABLE_COUNTRIES: &str = "available_countries";

/// A document database in the shape of Firestore's document API.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the backend, reported in logs
    fn backend(&self) -> &'static str;

    /// Fetch a document, `None` if it does not exist
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Create or replace a document. With `SetMode::Merge` fields not named
    /// in `writes` are kept.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        writes: WriteSet,
        mode: SetMode,
    ) -> StoreResult<()>;

    /// Create a document only if none exists under `id`.
    ///
    /// Returns `true` when this call created it. The existence check and the
    /// insert are one atomic step.
    async fn create(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<bool>;

    /// Merge into an existing document.
    ///
    /// Fails with `StoreError::NotFound` when the document is missing.
    async fn update(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<()>;

    /// Insert a new document under a generated id and return the id
    async fn add(&self, collection: &str, writes: WriteSet) -> StoreResult<String>;

    /// All documents of a collection, in insertion order
    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Documents whose array field `field` contains an element equal to `value`
    async fn find_array_contains(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let docs = self.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.array_contains(field, value))
            .collect())
    }
}

/// Reject empty path segments and ids containing a slash
pub(crate) fn validate_path(collection: &str, id: &str) -> StoreResult<()> {
    if collection.is_empty() || collection.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "collection name '{}' is not valid",
            collection
        )));
    }
    if id.is_empty() || id.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "document id '{}' is not valid",
            id
        )));
    }
    Ok(())
}

/// Generate a fresh document id
pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

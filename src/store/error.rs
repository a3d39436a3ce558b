//! Document store error types

use thiserror::Error;

/// Errors that can occur in a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// `update` targeted a document that does not exist
    #[error("No document to update: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Collection name or document id is unusable
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// SQLite backend failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound {
            collection: "chats".to_string(),
            id: "c1".to_string(),
        };
        assert_eq!(err.to_string(), "No document to update: chats/c1");
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}

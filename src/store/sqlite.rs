//! SQLite document store
//!
//! One `documents` table keyed by `(collection, id)` with the body stored as
//! JSON text. Insertion order is the rowid, which upserts keep stable.
//! Every write is a read-transform-replace inside one transaction.

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::types::now_millis;
use super::{
    new_document_id, validate_path, Document, DocumentStore, SetMode, StoreError, StoreResult,
    WriteSet,
};

/// Document store persisted to a single SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Create or open `globetalk.db` inside `data_dir`
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("globetalk.db");

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;

        tracing::debug!(path = ?path, "Opened SQLite document store");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire connection lock: {}", e)))
    }
}

fn read_body(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> StoreResult<Option<Map<String, Value>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

fn write_body(
    conn: &Connection,
    collection: &str,
    id: &str,
    body: &Map<String, Value>,
) -> StoreResult<()> {
    let text = serde_json::to_string(body)?;
    conn.execute(
        "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
         ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data",
        params![collection, id, text],
    )?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_path(collection, id)?;
        let conn = self.lock()?;
        Ok(read_body(&conn, collection, id)?.map(|body| Document::new(id, body)))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        writes: WriteSet,
        mode: SetMode,
    ) -> StoreResult<()> {
        validate_path(collection, id)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = match mode {
            SetMode::Merge => read_body(&tx, collection, id)?,
            SetMode::Overwrite => None,
        };
        let body = writes.apply_to(current, mode, now_millis());
        write_body(&tx, collection, id, &body)?;
        tx.commit()?;
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<bool> {
        validate_path(collection, id)?;
        let body = writes.apply_to(None, SetMode::Overwrite, now_millis());
        let text = serde_json::to_string(&body)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO NOTHING",
            params![collection, id, text],
        )?;
        Ok(inserted == 1)
    }

    async fn update(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<()> {
        validate_path(collection, id)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut body = read_body(&tx, collection, id)?.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        writes.apply(&mut body, now_millis());
        write_body(&tx, collection, id, &body)?;
        tx.commit()?;
        Ok(())
    }

    async fn add(&self, collection: &str, writes: WriteSet) -> StoreResult<String> {
        let id = new_document_id();
        validate_path(collection, &id)?;
        let body = writes.apply_to(None, SetMode::Overwrite, now_millis());
        let conn = self.lock()?;
        write_body(&conn, collection, &id, &body)?;
        Ok(id)
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, data FROM documents WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, text) = row?;
            docs.push(Document::new(id, serde_json::from_str(&text)?));
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        assert!(store.path().exists());
        assert!(store.list("chats").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store
                .set("chats", "a_b", WriteSet::new().set("messages", json!([])), SetMode::Overwrite)
                .await
                .unwrap();
            store
                .update(
                    "chats",
                    "a_b",
                    WriteSet::new().array_union(
                        "messages",
                        vec![json!({"sender": "a", "text": "hola", "deliveryTime": 5})],
                    ),
                )
                .await
                .unwrap();
        }

        let store = SqliteStore::open(dir.path()).unwrap();
        let chat = store.get("chats", "a_b").await.unwrap().unwrap();
        assert_eq!(chat.data["messages"][0]["text"], "hola");
    }

    #[tokio::test]
    async fn test_merge_and_update_missing() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        store
            .set("profiles", "u1", WriteSet::new().set("intro", "hi"), SetMode::Merge)
            .await
            .unwrap();
        store
            .set("profiles", "u1", WriteSet::new().increment("violationCount", 1), SetMode::Merge)
            .await
            .unwrap();

        let profile = store.get("profiles", "u1").await.unwrap().unwrap();
        assert_eq!(profile.data["intro"], "hi");
        assert_eq!(profile.data["violationCount"], 1);

        let err = store
            .update("profiles", "ghost", WriteSet::new().set("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order_across_upserts() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        for id in ["z", "a", "m"] {
            store
                .set("profiles", id, WriteSet::new().set("userID", id), SetMode::Overwrite)
                .await
                .unwrap();
        }
        store
            .set("profiles", "z", WriteSet::new().set("intro", "again"), SetMode::Merge)
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list("profiles")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_add_and_find_array_contains() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        let id = store
            .add("chats", WriteSet::new().set("users", json!(["u1", "u2"])))
            .await
            .unwrap();
        let found = store
            .find_array_contains("chats", "users", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn test_create_keeps_existing_document() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        let writes = || WriteSet::new().set("messages", json!([]));
        assert!(store.create("chats", "a_b", writes()).await.unwrap());
        store
            .update(
                "chats",
                "a_b",
                WriteSet::new().array_union("messages", vec![json!({"text": "first"})]),
            )
            .await
            .unwrap();

        assert!(!store.create("chats", "a_b", writes()).await.unwrap());
        let chat = store.get("chats", "a_b").await.unwrap().unwrap();
        assert_eq!(chat.data["messages"][0]["text"], "first");
    }
}

//! In-memory document store
//!
//! All collections live in one map behind a tokio `RwLock`. Writes hold the
//! write lock for the whole read-transform-replace cycle, which gives the
//! same per-document atomicity a Firestore write has.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::now_millis;
use super::{
    new_document_id, validate_path, Document, DocumentStore, SetMode, StoreError, StoreResult,
    WriteSet,
};

#[derive(Debug, Default)]
struct Collection {
    /// Insertion order of ids
    order: Vec<String>,
    docs: HashMap<String, Map<String, Value>>,
}

impl Collection {
    fn put(&mut self, id: &str, body: Map<String, Value>) {
        if self.docs.insert(id.to_string(), body).is_none() {
            self.order.push(id.to_string());
        }
    }
}

/// Document store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_path(collection, id)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.docs.get(id))
            .map(|body| Document::new(id, body.clone())))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        writes: WriteSet,
        mode: SetMode,
    ) -> StoreResult<()> {
        validate_path(collection, id)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        let current = coll.docs.get(id).cloned();
        let body = writes.apply_to(current, mode, now_millis());
        coll.put(id, body);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<bool> {
        validate_path(collection, id)?;
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        if coll.docs.contains_key(id) {
            return Ok(false);
        }
        coll.put(id, writes.apply_to(None, SetMode::Overwrite, now_millis()));
        Ok(true)
    }

    async fn update(&self, collection: &str, id: &str, writes: WriteSet) -> StoreResult<()> {
        validate_path(collection, id)?;
        let mut collections = self.collections.write().await;
        let body = collections
            .get_mut(collection)
            .and_then(|c| c.docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        writes.apply(body, now_millis());
        Ok(())
    }

    async fn add(&self, collection: &str, writes: WriteSet) -> StoreResult<String> {
        let id = new_document_id();
        validate_path(collection, &id)?;
        let body = writes.apply_to(None, SetMode::Overwrite, now_millis());
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .put(&id, body);
        Ok(id)
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .order
            .iter()
            .filter_map(|id| coll.docs.get(id).map(|body| Document::new(id.clone(), body.clone())))
            .collect())
    }
}

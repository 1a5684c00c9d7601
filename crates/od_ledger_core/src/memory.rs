//! crates/od_ledger_core/src/memory.rs
//!
//! An in-memory implementation of the `DocumentStore` port.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::ports::{DocumentStore, Fields, PortError, PortResult};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// In-memory, map-based document store.
///
/// Intended for tests and single-process deployments. Documents are cloned on
/// read and write. No guard is held across an `.await`. Scans return documents
/// in key order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|map| map.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if `collection` holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn read(&self) -> PortResult<std::sync::RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| PortError::Unexpected("document store lock poisoned".to_string()))
    }

    fn write(&self) -> PortResult<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| PortError::Unexpected("document store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> PortResult<Option<Fields>> {
        let map = self.read()?;
        Ok(map.get(collection).and_then(|docs| docs.get(key)).cloned())
    }

    async fn set(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()> {
        let mut map = self.write()?;
        map.entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, fields: Fields) -> PortResult<()> {
        let mut map = self.write()?;
        let document = map
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| PortError::NotFound(format!("{}/{}", collection, key)))?;
        document.extend(fields);
        Ok(())
    }

    async fn scan_all(&self, collection: &str) -> PortResult<Vec<(String, Fields)>> {
        let map = self.read()?;
        Ok(map
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, fields)| (key.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.read().map(|map| map.len()).unwrap_or(0);
        f.debug_struct("InMemoryDocumentStore")
            .field("collection_count", &collections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fields must be an object"),
        }
    }

    #[tokio::test]
    async fn get_missing_document_returns_none() {
        let store = InMemoryDocumentStore::new();
        assert!(store.get("ODs", "A1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_replaces_the_whole_document() {
        let store = InMemoryDocumentStore::new();
        store.set("ODs", "A1", fields(json!({ "a": 1, "b": 2 }))).await.unwrap();
        store.set("ODs", "A1", fields(json!({ "c": 3 }))).await.unwrap();

        let doc = store.get("ODs", "A1").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({ "c": 3 }));
        assert_eq!(store.len("ODs"), 1);
    }

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let store = InMemoryDocumentStore::new();
        store.set("ODs", "A1", fields(json!({ "a": 1, "b": 2 }))).await.unwrap();
        store.update("ODs", "A1", fields(json!({ "b": 20, "c": 3 }))).await.unwrap();

        let doc = store.get("ODs", "A1").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({ "a": 1, "b": 20, "c": 3 }));
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.update("ODs", "A1", fields(json!({ "a": 1 }))).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.is_empty("ODs"));
    }

    #[tokio::test]
    async fn scan_all_is_per_collection_and_key_ordered() {
        let store = InMemoryDocumentStore::new();
        store.set("ODs", "B2", fields(json!({ "n": 2 }))).await.unwrap();
        store.set("ODs", "A1", fields(json!({ "n": 1 }))).await.unwrap();
        store.set("students", "C3", fields(json!({ "n": 3 }))).await.unwrap();

        let keys: Vec<String> = store
            .scan_all("ODs")
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["A1", "B2"]);
        assert!(store.scan_all("missing").await.unwrap().is_empty());
    }
}

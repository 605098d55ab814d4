use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{Document, DocumentStore, StoreError, Write, WriteBatch};

/// In-process document store for tests and local runs. A single mutex makes
/// every batch commit atomic: all preconditions are checked before any write
/// is applied.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(String, String), Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_precondition(
        docs: &HashMap<(String, String), Document>,
        write: &Write,
    ) -> Result<(), StoreError> {
        let (collection, key) = write.target();
        let current = docs
            .get(&(collection.to_string(), key.to_string()))
            .map(|doc| doc.revision);

        match write.expected_revision() {
            None => Ok(()),
            Some(expected) if current == Some(expected) => Ok(()),
            Some(_) => Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.lock().expect("store mutex poisoned");
        Ok(docs.get(&(collection.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().put(collection, key, body))
            .await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().delete(collection, key)).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.lock().expect("store mutex poisoned");
        Ok(docs
            .iter()
            .filter(|((coll, _), doc)| {
                coll == collection
                    && doc.body.get(field).and_then(|v| v.as_str()) == Some(value)
            })
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().expect("store mutex poisoned");

        for write in &batch.writes {
            Self::check_precondition(&docs, write)?;
        }

        for write in batch.writes {
            match write {
                Write::Put {
                    collection,
                    key,
                    body,
                    ..
                } => {
                    let entry = (collection, key);
                    let revision = docs.get(&entry).map(|doc| doc.revision + 1).unwrap_or(1);
                    docs.insert(entry, Document { body, revision });
                }
                Write::Delete {
                    collection, key, ..
                } => {
                    docs.remove(&(collection, key));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_assigns_and_bumps_revision() {
        let store = MemoryStore::new();

        store.put("availability", "doc-1", json!({"a": 1})).await.unwrap();
        let first = store.get("availability", "doc-1").await.unwrap().unwrap();
        assert_eq!(first.revision, 1);

        store.put("availability", "doc-1", json!({"a": 2})).await.unwrap();
        let second = store.get("availability", "doc-1").await.unwrap().unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(second.body["a"], 2);
    }

    #[tokio::test]
    async fn stale_revision_rejects_whole_batch() {
        let store = MemoryStore::new();
        store.put("availability", "doc-1", json!({"a": 1})).await.unwrap();

        let batch = WriteBatch::new()
            .put("appointments", "appt-1", json!({"who": "x"}))
            .put_expecting("availability", "doc-1", json!({"a": 2}), 99);

        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // The unconditional write in the same batch must not have landed.
        assert!(store.get("appointments", "appt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_eq_matches_top_level_string_field() {
        let store = MemoryStore::new();
        store
            .put("appointments", "a1", json!({"doctor_id": "d1"}))
            .await
            .unwrap();
        store
            .put("appointments", "a2", json!({"doctor_id": "d2"}))
            .await
            .unwrap();

        let rows = store.query_eq("appointments", "doctor_id", "d1").await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}

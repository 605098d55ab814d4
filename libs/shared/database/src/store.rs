use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict on {collection}/{key}")]
    Conflict { collection: String, key: String },

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// A stored document together with its optimistic-concurrency token.
/// The revision is owned by the store and incremented on every committed put.
#[derive(Debug, Clone)]
pub struct Document {
    pub body: Value,
    pub revision: i64,
}

#[derive(Debug, Clone)]
pub enum Write {
    Put {
        collection: String,
        key: String,
        body: Value,
        expected_revision: Option<i64>,
    },
    Delete {
        collection: String,
        key: String,
        expected_revision: Option<i64>,
    },
}

impl Write {
    pub fn target(&self) -> (&str, &str) {
        match self {
            Write::Put { collection, key, .. } => (collection, key),
            Write::Delete { collection, key, .. } => (collection, key),
        }
    }

    pub fn expected_revision(&self) -> Option<i64> {
        match self {
            Write::Put {
                expected_revision, ..
            } => *expected_revision,
            Write::Delete {
                expected_revision, ..
            } => *expected_revision,
        }
    }
}

/// An ordered set of writes applied all-or-nothing. Any write may carry an
/// expected revision; a mismatch rejects the whole batch with
/// [`StoreError::Conflict`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, collection: &str, key: &str, body: Value) -> Self {
        self.writes.push(Write::Put {
            collection: collection.to_string(),
            key: key.to_string(),
            body,
            expected_revision: None,
        });
        self
    }

    pub fn put_expecting(
        mut self,
        collection: &str,
        key: &str,
        body: Value,
        revision: i64,
    ) -> Self {
        self.writes.push(Write::Put {
            collection: collection.to_string(),
            key: key.to_string(),
            body,
            expected_revision: Some(revision),
        });
        self
    }

    pub fn delete(mut self, collection: &str, key: &str) -> Self {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
            expected_revision: None,
        });
        self
    }

    pub fn delete_expecting(mut self, collection: &str, key: &str, revision: i64) -> Self {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
            expected_revision: Some(revision),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

/// The hosted document database the cells talk to. Point reads and writes by
/// collection + key, equality queries for listings, and an atomic
/// all-or-nothing batch commit.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    async fn put(&self, collection: &str, key: &str, body: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// Documents whose top-level string field `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

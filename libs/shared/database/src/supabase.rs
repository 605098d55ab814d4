use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::store::{Document, DocumentStore, StoreError, Write, WriteBatch};

/// Supabase-backed document store. Each collection is a PostgREST table with
/// `key` (text, primary key), `body` (jsonb) and `revision` (bigint) columns.
/// Single writes and batches both go through the `commit_batch` RPC, which
/// runs in one transaction and bumps revisions server-side.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_api_key.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), StoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        Ok((status, value))
    }

    fn parse_row(row: &Value) -> Result<Document, StoreError> {
        let body = row
            .get("body")
            .cloned()
            .ok_or_else(|| StoreError::Malformed("row missing body column".to_string()))?;
        let revision = row
            .get("revision")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoreError::Malformed("row missing revision column".to_string()))?;

        Ok(Document { body, revision })
    }

    fn batch_payload(batch: &WriteBatch) -> Value {
        let writes: Vec<Value> = batch
            .writes
            .iter()
            .map(|write| match write {
                Write::Put {
                    collection,
                    key,
                    body,
                    expected_revision,
                } => json!({
                    "op": "put",
                    "collection": collection,
                    "key": key,
                    "body": body,
                    "expected_revision": expected_revision,
                }),
                Write::Delete {
                    collection,
                    key,
                    expected_revision,
                } => json!({
                    "op": "delete",
                    "collection": collection,
                    "key": key,
                    "expected_revision": expected_revision,
                }),
            })
            .collect();

        json!({ "writes": writes })
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let path = format!(
            "/rest/v1/{}?key=eq.{}&select=key,body,revision",
            collection, key
        );
        let (status, value) = self.request(Method::GET, &path, None).await?;

        if !status.is_success() {
            error!("Store read failed ({}): {}", status, value);
            return Err(StoreError::Unavailable(format!(
                "read {}/{} returned {}",
                collection, key, status
            )));
        }

        match value.as_array().and_then(|rows| rows.first()) {
            Some(row) => Ok(Some(Self::parse_row(row)?)),
            None => Ok(None),
        }
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
        let path = format!(
            "/rest/v1/{}?body->>{}=eq.{}&select=key,body,revision",
            collection, field, value
        );
        let (status, response) = self.request(Method::GET, &path, None).await?;

        if !status.is_success() {
            error!("Store query failed ({}): {}", status, response);
            return Err(StoreError::Unavailable(format!(
                "query {} by {} returned {}",
                collection, field, status
            )));
        }

        response
            .as_array()
            .map(|rows| rows.iter().map(Self::parse_row).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let payload = Self::batch_payload(&batch);
        let (status, value) = self
            .request(Method::POST, "/rest/v1/rpc/commit_batch", Some(payload))
            .await?;

        if status == StatusCode::CONFLICT {
            let (collection, key) = batch
                .writes
                .iter()
                .find(|w| w.expected_revision().is_some())
                .or_else(|| batch.writes.first())
                .map(|w| w.target())
                .unwrap_or(("", ""));
            debug!("Batch commit rejected with conflict on {}/{}", collection, key);
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        if !status.is_success() {
            error!("Batch commit failed ({}): {}", status, value);
            return Err(StoreError::Unavailable(format!(
                "batch commit returned {}",
                status
            )));
        }

        Ok(())
    }
}

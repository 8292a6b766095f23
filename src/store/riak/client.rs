//! Riak client surface
//!
//! Key/value calls on buckets plus the search index. Values are JSON
//! documents; search hits come back in the index's own document form.

use async_trait::async_trait;
use serde_json::Value;

/// Error reported by a Riak client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct RiakError {
    /// Client call that failed, e.g. `fetch_value`
    pub operation: String,
    /// Detail from the node
    pub message: String,
}

impl RiakError {
    /// Create a client error.
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Full-text search over one bucket's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Index name; one index per bucket
    pub index: String,
    /// Fields the text is matched against
    pub fields: Vec<String>,
    /// Free text
    pub text: String,
    /// Restrict hits to keys in this channel
    pub channel: Option<String>,
    /// Maximum hits
    pub rows: usize,
}

/// Riak key/value and search client.
#[async_trait]
pub trait RiakClient: Send + Sync {
    /// Read one value. `Ok(None)` when the key is absent.
    async fn fetch_value(&self, bucket: &str, key: &str) -> Result<Option<Value>, RiakError>;

    /// Write one value, replacing any previous one.
    async fn store_value(&self, bucket: &str, key: &str, value: Value) -> Result<(), RiakError>;

    /// Delete one key. Riak does not report whether it existed.
    async fn delete_value(&self, bucket: &str, key: &str) -> Result<(), RiakError>;

    /// Every key in a bucket, in no particular order.
    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, RiakError>;

    /// Run a search; hits are raw index documents.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, RiakError>;
}

//! DynamoDB request/response types
//!
//! Attribute values are the SDK's own [`AttributeValue`]; the request and
//! response structs below are the subset of each operation this adapter
//! uses, shared by the real and the simulated client.

use std::collections::HashMap;

pub use aws_sdk_dynamodb::primitives::Blob;
pub use aws_sdk_dynamodb::types::AttributeValue;

/// One item: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// Key schema of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub table_name: String,
    /// Partition key attribute
    pub hash_key: String,
    /// Sort key attribute, if the table has one
    pub range_key: Option<String>,
}

/// `PutItem` request.
#[derive(Debug, Clone)]
pub struct PutItemInput {
    /// Target table
    pub table_name: String,
    /// Full item, key attributes included
    pub item: Item,
}

/// `PutItem` response.
#[derive(Debug, Clone, Default)]
pub struct PutItemOutput {}

/// `GetItem` request.
#[derive(Debug, Clone)]
pub struct GetItemInput {
    /// Target table
    pub table_name: String,
    /// Key attributes only
    pub key: Item,
}

/// `GetItem` response.
#[derive(Debug, Clone, Default)]
pub struct GetItemOutput {
    /// The item, when it exists
    pub item: Option<Item>,
}

/// `DeleteItem` request, always with `ReturnValues=ALL_OLD`.
#[derive(Debug, Clone)]
pub struct DeleteItemInput {
    /// Target table
    pub table_name: String,
    /// Key attributes only
    pub key: Item,
}

/// `DeleteItem` response.
#[derive(Debug, Clone, Default)]
pub struct DeleteItemOutput {
    /// The deleted item, when one existed
    pub attributes: Option<Item>,
}

/// `Query` request: hash-key equality only.
#[derive(Debug, Clone)]
pub struct QueryInput {
    /// Target table
    pub table_name: String,
    /// Partition key attribute name
    pub hash_key: String,
    /// Partition key value (`:channel`)
    pub hash_value: AttributeValue,
    /// Maximum items to evaluate
    pub limit: Option<usize>,
}

/// `Scan` request.
#[derive(Debug, Clone)]
pub struct ScanInput {
    /// Target table
    pub table_name: String,
    /// Maximum items to evaluate
    pub limit: Option<usize>,
}

/// `Query`/`Scan` response.
#[derive(Debug, Clone, Default)]
pub struct ItemsOutput {
    /// Matching items in table order
    pub items: Vec<Item>,
    /// Present when more items remain past `limit`
    pub last_evaluated_key: Option<Item>,
}

/// Error reported by a DynamoDB client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ClientError {
    /// Service error code, e.g. `ResourceNotFoundException`
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl ClientError {
    /// Create a client error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

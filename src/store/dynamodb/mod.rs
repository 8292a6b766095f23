//! `DynamoStore` - DynamoDB-class adapter
//!
//! TigerStyle: Client shape bound once, channel-aware keys everywhere.
//!
//! # Tables
//!
//! One table per type, named `<prefix><type>`:
//!
//! | type      | hash key  | range key |
//! |-----------|-----------|-----------|
//! | `channel` | `id`      | -         |
//! | others    | `channel` | `id`      |
//!
//! `scan` with a channel is a partition query on `channel`; without one it is
//! a full-table scan, which only the channel type may do.
//!
//! # Clients
//!
//! [`AwsDynamoClient`] talks to DynamoDB through `aws-sdk-dynamodb`;
//! [`SimDynamoClient`] keeps tables in process. Both offer the callback and
//! the awaitable surface, and either can be restricted to callbacks.
//!
//! # Batches
//!
//! Generic `batchGet` isolates every key. The channel variant joins its
//! lookups with [`fanout::all_or_nothing`], so one backend failure fails the
//! whole batch.

mod aws;
mod client;
mod marshal;
mod sim;
mod types;

pub use aws::{AwsClientOptions, AwsDynamoClient};
pub use client::{bind, Callback, ClientShape, DynamoClient, ItemOps, PromiseDynamoClient, ScanOrQuery};
pub use marshal::{from_attribute, marshal, to_attribute, unmarshal};
pub use sim::SimDynamoClient;
pub use types::{
    AttributeValue, Blob, ClientError, DeleteItemInput, DeleteItemOutput, GetItemInput, GetItemOutput,
    Item, ItemsOutput, PutItemInput, PutItemOutput, QueryInput, ScanInput, TableSchema,
};

use std::sync::Arc;

use async_trait::async_trait;

use super::args::{check_entity_channel, BatchGetArgs, GetArgs, KeyArgs, ScanArgs};
use super::backend::{CatalogStore, EntityStore};
use super::fanout;
use crate::constants::{CHANNEL_TYPE, TABLE_PREFIX_DEFAULT};
use crate::entity::{Entity, StoreKey};
use crate::error::{StoreError, StoreResult};

const ATTRIBUTE_CHANNEL: &str = "channel";
const ATTRIBUTE_ID: &str = "id";

/// DynamoDB-class adapter over any [`DynamoClient`].
pub struct DynamoStore {
    ops: Arc<dyn ItemOps>,
    table_prefix: String,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore")
            .field("shape", &self.ops.shape())
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

impl DynamoStore {
    /// Bind `client` and use the default table prefix.
    #[must_use]
    pub fn new(client: Arc<dyn DynamoClient>) -> Self {
        Self {
            ops: bind(client),
            table_prefix: TABLE_PREFIX_DEFAULT.to_string(),
        }
    }

    /// Override the table prefix.
    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Which client flavor this store was bound to.
    #[must_use]
    pub fn client_shape(&self) -> ClientShape {
        self.ops.shape()
    }

    /// Table holding `entity_type`.
    #[must_use]
    pub fn table_name(&self, entity_type: &str) -> String {
        format!("{}{entity_type}", self.table_prefix)
    }

    /// Key schema of the table holding `entity_type`.
    #[must_use]
    pub fn table_schema(&self, entity_type: &str) -> TableSchema {
        let (hash_key, range_key) = if entity_type == CHANNEL_TYPE {
            (ATTRIBUTE_ID, None)
        } else {
            (ATTRIBUTE_CHANNEL, Some(ATTRIBUTE_ID.to_string()))
        };
        TableSchema {
            table_name: self.table_name(entity_type),
            hash_key: hash_key.to_string(),
            range_key,
        }
    }
}

fn key_item(key: &StoreKey) -> Item {
    let mut item = Item::new();
    if let Some(channel) = key.channel() {
        item.insert(ATTRIBUTE_CHANNEL.to_string(), AttributeValue::S(channel.to_string()));
    }
    item.insert(ATTRIBUTE_ID.to_string(), AttributeValue::S(key.id().to_string()));
    item
}

#[async_trait]
impl EntityStore for DynamoStore {
    fn name(&self) -> &str {
        "dynamodb"
    }

    #[tracing::instrument(skip(self, args), fields(id = ?args.id, channel = ?args.channel))]
    async fn get(&self, entity_type: &str, args: &GetArgs) -> StoreResult<Option<Entity>> {
        let key = args.key(entity_type)?;
        let output = self
            .ops
            .get_item(GetItemInput {
                table_name: self.table_name(entity_type),
                key: key_item(&key),
            })
            .await?;
        output.item.map(unmarshal).transpose()
    }

    #[tracing::instrument(skip(self, entity), fields(channel = ?entity.channel))]
    async fn set(&self, entity_type: &str, mut entity: Entity) -> StoreResult<Entity> {
        entity.entity_type = entity_type.to_string();
        check_entity_channel(&entity)?;
        if entity.ensure_id() {
            tracing::debug!(id = ?entity.id, "assigned id");
        }
        entity.key()?;

        let stored = entity.stored_copy();
        self.ops
            .put_item(PutItemInput {
                table_name: self.table_name(entity_type),
                item: marshal(&stored)?,
            })
            .await?;
        Ok(stored)
    }
}

#[async_trait]
impl CatalogStore for DynamoStore {
    #[tracing::instrument(skip(self, args), fields(id = %args.id, channel = ?args.channel))]
    async fn remove(&self, entity_type: &str, args: &KeyArgs) -> StoreResult<bool> {
        let key = args.key(entity_type)?;
        let output = self
            .ops
            .delete_item(DeleteItemInput {
                table_name: self.table_name(entity_type),
                key: key_item(&key),
            })
            .await?;
        Ok(output.attributes.is_some())
    }

    #[tracing::instrument(skip(self, args), fields(channel = ?args.channel, limit = args.limit))]
    async fn scan(&self, entity_type: &str, args: &ScanArgs) -> StoreResult<Vec<Entity>> {
        let table_name = self.table_name(entity_type);
        let request = match args.channel.as_deref() {
            Some(channel) => ScanOrQuery::Query(QueryInput {
                table_name,
                hash_key: ATTRIBUTE_CHANNEL.to_string(),
                hash_value: AttributeValue::S(channel.to_string()),
                limit: Some(args.limit),
            }),
            None if entity_type == CHANNEL_TYPE => ScanOrQuery::Scan(ScanInput {
                table_name,
                limit: Some(args.limit),
            }),
            None => {
                return Err(StoreError::missing(format!(
                    "scan({entity_type}) requires channel"
                )))
            }
        };

        let output = self.ops.scan_or_query(request).await?;
        output
            .items
            .into_iter()
            .take(args.limit)
            .map(unmarshal)
            .collect()
    }

    async fn batch_get_channels(&self, args: &BatchGetArgs) -> StoreResult<Vec<Entity>> {
        fanout::all_or_nothing(self, None, &args.keys).await
    }
}

// =============================================================================
// Tests
// =============================================================================

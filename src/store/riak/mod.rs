//! `RiakStore` - Riak-class adapter
//!
//! TigerStyle: Composite string keys, client-side limits.
//!
//! One bucket per type (`<prefix><type>`). Riak keys are flat strings, so the
//! key is the composite `channel:id` (or `id` for channels); the separator is
//! reserved and rejected inside ids and channels.
//!
//! There is no server-side scan. Listing reads the bucket's keys, keeps those
//! under the channel prefix, sorts them so a fixed snapshot always lists the
//! same way, and fetches each value. `scan` cuts the key list at `limit`
//! before fetching.

mod client;
mod sim;

pub use client::{RiakClient, RiakError, SearchRequest};
pub use sim::SimRiakClient;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use super::args::{check_entity_channel, GetArgs, KeyArgs, ScanArgs};
use super::backend::{CatalogStore, EntityStore};
use super::dispatch::{register_batch_get, register_remove, register_scan, register_set};
use super::relationships;
use crate::bus::{handler, Bus, Pattern};
use crate::constants::{BUCKET_PREFIX_DEFAULT, CHANNEL_TYPE, CMD_GET, CMD_QUERY, SEARCH_RESULTS_COUNT_MAX};
use crate::entity::{Entity, StoreKey};
use crate::error::{StoreError, StoreResult};

/// Fields the Riak search index matches free text against.
pub const SEARCH_FIELDS: [&str; 2] = ["title", "description"];

fn backend_error(err: RiakError) -> StoreError {
    StoreError::backend("riak", err.to_string())
}

/// Riak-class adapter over any [`RiakClient`].
pub struct RiakStore {
    client: Arc<dyn RiakClient>,
    bucket_prefix: String,
}

impl std::fmt::Debug for RiakStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiakStore")
            .field("bucket_prefix", &self.bucket_prefix)
            .finish_non_exhaustive()
    }
}

impl RiakStore {
    /// Store over `client` with the default bucket prefix.
    #[must_use]
    pub fn new(client: Arc<dyn RiakClient>) -> Self {
        Self {
            client,
            bucket_prefix: BUCKET_PREFIX_DEFAULT.to_string(),
        }
    }

    /// Override the bucket prefix.
    #[must_use]
    pub fn with_bucket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bucket_prefix = prefix.into();
        self
    }

    /// Bucket holding `entity_type`.
    #[must_use]
    pub fn bucket(&self, entity_type: &str) -> String {
        format!("{}{entity_type}", self.bucket_prefix)
    }

    async fn keys_in(&self, entity_type: &str, channel: Option<&str>) -> StoreResult<Vec<String>> {
        let prefix = if entity_type == CHANNEL_TYPE {
            None
        } else {
            let channel = channel
                .filter(|c| !c.is_empty())
                .ok_or_else(|| StoreError::missing(format!("list({entity_type}) requires channel")))?;
            StoreKey::check_component("channel", channel)?;
            Some(StoreKey::channel_prefix(channel))
        };

        let mut keys = self
            .client
            .list_keys(&self.bucket(entity_type))
            .await
            .map_err(backend_error)?;
        if let Some(prefix) = prefix {
            keys.retain(|key| key.starts_with(&prefix));
        }
        keys.sort();
        Ok(keys)
    }

    async fn fetch_all(&self, entity_type: &str, keys: &[String]) -> StoreResult<Vec<Entity>> {
        let bucket = self.bucket(entity_type);
        let values = try_join_all(keys.iter().map(|key| self.client.fetch_value(&bucket, key)))
            .await
            .map_err(backend_error)?;
        // A key deleted between listing and fetching reads as absent.
        values.into_iter().flatten().map(Entity::from_value).collect()
    }

    /// Every record of a type in one channel (or every channel record).
    ///
    /// # Errors
    /// `MissingParameter` without a channel for non-channel types,
    /// `InvalidParameter` for a channel holding the key separator; backend errors.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, entity_type: &str, channel: Option<&str>) -> StoreResult<Vec<Entity>> {
        let keys = self.keys_in(entity_type, channel).await?;
        self.fetch_all(entity_type, &keys).await
    }

    /// Free-text search over `title` and `description`. Returns the index's
    /// raw documents, not entities.
    ///
    /// # Errors
    /// `MissingParameter` for an empty query; backend errors.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, entity_type: &str, text: &str, channel: Option<&str>) -> StoreResult<Vec<Value>> {
        if text.trim().is_empty() {
            return Err(StoreError::missing(format!("query({entity_type}) requires query")));
        }
        let request = SearchRequest {
            index: self.bucket(entity_type),
            fields: SEARCH_FIELDS.iter().map(|f| (*f).to_string()).collect(),
            text: text.to_string(),
            channel: channel.map(str::to_string),
            rows: SEARCH_RESULTS_COUNT_MAX,
        };
        self.client.search(&request).await.map_err(backend_error)
    }
}

#[async_trait]
impl EntityStore for RiakStore {
    fn name(&self) -> &str {
        "riak"
    }

    #[tracing::instrument(skip(self, args), fields(id = ?args.id, channel = ?args.channel))]
    async fn get(&self, entity_type: &str, args: &GetArgs) -> StoreResult<Option<Entity>> {
        let key = args.key(entity_type)?;
        let value = self
            .client
            .fetch_value(&self.bucket(entity_type), &key.composite())
            .await
            .map_err(backend_error)?;
        value.map(Entity::from_value).transpose()
    }

    #[tracing::instrument(skip(self, entity), fields(channel = ?entity.channel))]
    async fn set(&self, entity_type: &str, mut entity: Entity) -> StoreResult<Entity> {
        entity.entity_type = entity_type.to_string();
        check_entity_channel(&entity)?;
        entity.ensure_id();
        let key = entity.key()?;

        let stored = entity.stored_copy();
        self.client
            .store_value(&self.bucket(entity_type), &key.composite(), stored.to_value()?)
            .await
            .map_err(backend_error)?;
        Ok(stored)
    }
}

#[async_trait]
impl CatalogStore for RiakStore {
    #[tracing::instrument(skip(self, args), fields(id = %args.id, channel = ?args.channel))]
    async fn remove(&self, entity_type: &str, args: &KeyArgs) -> StoreResult<bool> {
        let key = args.key(entity_type)?.composite();
        let bucket = self.bucket(entity_type);

        // Deletes are blind; read first to report existence.
        let existed = self
            .client
            .fetch_value(&bucket, &key)
            .await
            .map_err(backend_error)?
            .is_some();
        if existed {
            self.client.delete_value(&bucket, &key).await.map_err(backend_error)?;
        }
        Ok(existed)
    }

    #[tracing::instrument(skip(self, args), fields(channel = ?args.channel, limit = args.limit))]
    async fn scan(&self, entity_type: &str, args: &ScanArgs) -> StoreResult<Vec<Entity>> {
        let mut keys = self.keys_in(entity_type, args.channel.as_deref()).await?;
        keys.truncate(args.limit);
        self.fetch_all(entity_type, &keys).await
    }
}

// =============================================================================
// Registration
// =============================================================================

/// `get` that lists the bucket when no id is given.
async fn register_listing_get(bus: &Bus, store: Arc<RiakStore>, entity_type: &str) {
    let entity_type = entity_type.to_string();
    let lookup_bus = bus.clone();

    bus.query_handler(
        Pattern::store(CMD_GET).with_type(entity_type.clone()),
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            let bus = lookup_bus.clone();
            let entity_type = entity_type.clone();
            async move {
                let args = GetArgs::parse(&entity_type, &args)?;
                if args.id.is_none() {
                    let all = store.list(&entity_type, args.channel.as_deref()).await?;
                    return Ok(serde_json::to_value(all)?);
                }
                match store.get(&entity_type, &args).await? {
                    Some(entity) => relationships::expand(&bus, entity, &args.include).await.to_value(),
                    None => Ok(Value::Null),
                }
            }
        }),
    )
    .await;
}

/// Raw-document search for one type.
async fn register_query(bus: &Bus, store: Arc<RiakStore>, entity_type: &str) {
    let entity_type = entity_type.to_string();

    bus.query_handler(
        Pattern::store(CMD_QUERY).with_type(entity_type.clone()),
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            let entity_type = entity_type.clone();
            async move {
                let text = args.get("query").and_then(Value::as_str).unwrap_or_default();
                let channel = args.get("channel").and_then(Value::as_str);
                Ok(Value::Array(store.search(&entity_type, text, channel).await?))
            }
        }),
    )
    .await;
}

/// Register the full contract plus listing `get` and `query` for each type.
pub async fn register(bus: &Bus, store: Arc<RiakStore>, types: &[String], scan_default: usize) {
    for entity_type in types {
        register_listing_get(bus, Arc::clone(&store), entity_type).await;
        register_set(bus, Arc::clone(&store), entity_type).await;
        register_remove(bus, Arc::clone(&store), entity_type).await;
        register_scan(bus, Arc::clone(&store), entity_type, scan_default).await;
        register_query(bus, Arc::clone(&store), entity_type).await;
    }
    let with_channel_variant = types.iter().any(|t| t == CHANNEL_TYPE);
    register_batch_get(bus, Arc::clone(&store), with_channel_variant).await;
    tracing::info!(store = store.name(), types = ?types, "registered riak store");
}

// =============================================================================
// Tests
// =============================================================================

//! Store Backend Traits
//!
//! TigerStyle: Abstract interface for entity storage.
//!
//! Two levels, so a reduced adapter says so in its type:
//! - [`EntityStore`]: `get` + `set`. Every adapter.
//! - [`CatalogStore`]: adds `remove`, `scan`, `batchGet`. Full adapters only.
//!
//! `get` here is the primitive read. Relationship expansion and batch fan-out
//! are layered on top by `relationships` and `fanout` through [`EntityLookup`].

use async_trait::async_trait;

use super::args::{BatchGetArgs, GetArgs, KeyArgs, ScanArgs};
use super::fanout;
use crate::entity::{Entity, EntityRef};
use crate::error::StoreResult;

/// Minimal adapter contract: primitive read and full-document upsert.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Adapter name, used for store-scoped patterns and error context.
    fn name(&self) -> &str;

    /// Read one record. `Ok(None)` when absent.
    async fn get(&self, entity_type: &str, args: &GetArgs) -> StoreResult<Option<Entity>>;

    /// Upsert (full replace). Assigns an id when absent and returns the
    /// stored copy.
    async fn set(&self, entity_type: &str, entity: Entity) -> StoreResult<Entity>;
}

/// Full adapter contract.
#[async_trait]
pub trait CatalogStore: EntityStore {
    /// Delete one record. True if it existed.
    async fn remove(&self, entity_type: &str, args: &KeyArgs) -> StoreResult<bool>;

    /// Records of one type in one channel (or all channels), capped at `limit`.
    async fn scan(&self, entity_type: &str, args: &ScanArgs) -> StoreResult<Vec<Entity>>;

    /// Resolve many keys; failures and misses are dropped, order kept.
    async fn batch_get(&self, args: &BatchGetArgs) -> StoreResult<Vec<Entity>> {
        Ok(fanout::isolated(self, args.channel.as_deref(), &args.keys).await)
    }

    /// Channel-record variant of [`CatalogStore::batch_get`].
    async fn batch_get_channels(&self, args: &BatchGetArgs) -> StoreResult<Vec<Entity>> {
        self.batch_get(args).await
    }
}

/// Anything that can resolve a `{type, id}` reference within a channel.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// Resolve a reference. `Ok(None)` when absent.
    async fn lookup(&self, channel: Option<&str>, reference: &EntityRef) -> StoreResult<Option<Entity>>;
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityLookup for S {
    async fn lookup(&self, channel: Option<&str>, reference: &EntityRef) -> StoreResult<Option<Entity>> {
        let mut args = GetArgs::new(reference.id.clone());
        args.channel = channel.map(str::to_string);
        self.get(&reference.entity_type, &args).await
    }
}

//! `MemoryStore` - Process-local reference adapter
//!
//! TigerStyle: Reduced contract, stated in the type.
//!
//! Implements [`EntityStore`] only: `get` and `set`, keyed by `(type, id)`.
//! There is no `remove`, `scan` or `batchGet`; on the bus those patterns have
//! no handler. Channel arguments are still validated but do not partition.
//!
//! Storage is an injected [`MemoryTable`], so independent stores can coexist
//! in one process and tests can share or inspect a table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::args::{check_entity_channel, GetArgs};
use super::backend::EntityStore;
use crate::entity::Entity;
use crate::error::StoreResult;

// =============================================================================
// MemoryTable
// =============================================================================

/// Shared in-memory record table keyed by `(type, id)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    records: Arc<RwLock<HashMap<(String, String), Entity>>>,
}

impl MemoryTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Reference adapter over a [`MemoryTable`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    table: MemoryTable,
}

impl MemoryStore {
    /// Create a store over `table`.
    #[must_use]
    pub fn new(table: MemoryTable) -> Self {
        Self { table }
    }

    /// The backing table.
    #[must_use]
    pub fn table(&self) -> &MemoryTable {
        &self.table
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    #[tracing::instrument(skip(self, args), fields(id = ?args.id))]
    async fn get(&self, entity_type: &str, args: &GetArgs) -> StoreResult<Option<Entity>> {
        let key = args.key(entity_type)?;

        let records = self.table.records.read().await;
        Ok(records
            .get(&(entity_type.to_string(), key.id().to_string()))
            .cloned())
    }

    #[tracing::instrument(skip(self, entity))]
    async fn set(&self, entity_type: &str, mut entity: Entity) -> StoreResult<Entity> {
        entity.entity_type = entity_type.to_string();
        check_entity_channel(&entity)?;
        entity.ensure_id();
        let key = entity.key()?;

        let stored = entity.stored_copy();
        let mut records = self.table.records.write().await;
        records.insert(
            (entity_type.to_string(), key.id().to_string()),
            stored.clone(),
        );

        Ok(stored)
    }
}

// =============================================================================
// Tests
// =============================================================================

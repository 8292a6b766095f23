//! Dispatch - Registering adapters on the bus
//!
//! TigerStyle: One registration per `{role:'store', cmd, type}`.
//!
//! | cmd      | table            | pattern                                   |
//! |----------|------------------|-------------------------------------------|
//! | get      | query            | `{role, cmd, type}`                       |
//! | set      | command + query  | `{role, cmd, type}`                       |
//! | remove   | command          | `{role, cmd, type}`                       |
//! | scan     | query            | `{role, cmd, type}`                       |
//! | batchGet | query            | `{role, cmd}` and `{role, cmd, store}`    |
//! | batchGet | query            | `{role, cmd, type:'channel'}`             |
//!
//! The generic batchGet is registered before the channel variant so it can
//! never shadow it, even on a bus that routes by registration order alone.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::args::{parse_payload, BatchGetArgs, GetArgs, KeyArgs, ScanArgs};
use super::backend::{CatalogStore, EntityLookup, EntityStore};
use super::relationships;
use crate::bus::{handler, Bus, Pattern};
use crate::constants::{
    CHANNEL_TYPE, CMD_BATCH_GET, CMD_GET, CMD_REMOVE, CMD_SCAN, CMD_SET,
};
use crate::entity::{Entity, EntityRef};
use crate::error::StoreResult;

// =============================================================================
// Bus as Lookup
// =============================================================================

/// References resolve through the bus, so they reach whichever adapter owns
/// the referenced type.
#[async_trait]
impl EntityLookup for Bus {
    async fn lookup(&self, channel: Option<&str>, reference: &EntityRef) -> StoreResult<Option<Entity>> {
        let pattern = Pattern::store(CMD_GET).with_type(reference.entity_type.clone());
        let mut args = json!({ "id": reference.id });
        if let Some(channel) = channel {
            args["channel"] = json!(channel);
        }
        match self.query(&pattern, args).await? {
            Value::Null => Ok(None),
            value => Entity::from_value(value).map(Some),
        }
    }
}

fn entities_to_value(entities: Vec<Entity>) -> StoreResult<Value> {
    Ok(serde_json::to_value(entities)?)
}

// =============================================================================
// Per-Command Registration
// =============================================================================

/// `get` for one type, with include expansion through the bus.
pub async fn register_get<S>(bus: &Bus, store: Arc<S>, entity_type: &str)
where
    S: EntityStore + ?Sized + 'static,
{
    let entity_type = entity_type.to_string();
    let lookup_bus = bus.clone();
    let pattern = Pattern::store(CMD_GET).with_type(entity_type.clone());

    bus.query_handler(
        pattern,
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            let bus = lookup_bus.clone();
            let entity_type = entity_type.clone();
            async move {
                let args = GetArgs::parse(&entity_type, &args)?;
                match store.get(&entity_type, &args).await? {
                    Some(entity) => {
                        let entity = relationships::expand(&bus, entity, &args.include).await;
                        entity.to_value()
                    }
                    None => Ok(Value::Null),
                }
            }
        }),
    )
    .await;
}

/// `set` for one type, on both the command and query tables.
pub async fn register_set<S>(bus: &Bus, store: Arc<S>, entity_type: &str)
where
    S: EntityStore + ?Sized + 'static,
{
    let make = |store: Arc<S>, entity_type: String| {
        handler(move |payload: Value| {
            let store = Arc::clone(&store);
            let entity_type = entity_type.clone();
            async move {
                let entity = parse_payload(&entity_type, payload)?;
                store.set(&entity_type, entity).await?.to_value()
            }
        })
    };

    let pattern = Pattern::store(CMD_SET).with_type(entity_type);
    bus.command_handler(
        pattern.clone(),
        make(Arc::clone(&store), entity_type.to_string()),
    )
    .await;
    bus.query_handler(pattern, make(store, entity_type.to_string()))
        .await;
}

/// `remove` for one type.
pub async fn register_remove<S>(bus: &Bus, store: Arc<S>, entity_type: &str)
where
    S: CatalogStore + ?Sized + 'static,
{
    let entity_type = entity_type.to_string();
    let pattern = Pattern::store(CMD_REMOVE).with_type(entity_type.clone());

    bus.command_handler(
        pattern,
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            let entity_type = entity_type.clone();
            async move {
                let args = KeyArgs::parse(&entity_type, &args)?;
                Ok(Value::Bool(store.remove(&entity_type, &args).await?))
            }
        }),
    )
    .await;
}

/// `scan` for one type.
pub async fn register_scan<S>(bus: &Bus, store: Arc<S>, entity_type: &str, default_limit: usize)
where
    S: CatalogStore + ?Sized + 'static,
{
    let entity_type = entity_type.to_string();
    let pattern = Pattern::store(CMD_SCAN).with_type(entity_type.clone());

    bus.query_handler(
        pattern,
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            let entity_type = entity_type.clone();
            async move {
                let args = ScanArgs::parse(&entity_type, &args, default_limit)?;
                entities_to_value(store.scan(&entity_type, &args).await?)
            }
        }),
    )
    .await;
}

/// Generic and store-scoped `batchGet`, plus the channel variant when
/// `with_channel_variant` is set.
pub async fn register_batch_get<S>(bus: &Bus, store: Arc<S>, with_channel_variant: bool)
where
    S: CatalogStore + ?Sized + 'static,
{
    let generic = |store: Arc<S>| {
        handler(move |args: Value| {
            let store = Arc::clone(&store);
            async move {
                let args = BatchGetArgs::parse(&args, None)?;
                entities_to_value(store.batch_get(&args).await?)
            }
        })
    };

    bus.query_handler(Pattern::store(CMD_BATCH_GET), generic(Arc::clone(&store)))
        .await;
    bus.query_handler(
        Pattern::store(CMD_BATCH_GET).with_store(store.name()),
        generic(Arc::clone(&store)),
    )
    .await;

    if with_channel_variant {
        bus.query_handler(
            Pattern::store(CMD_BATCH_GET).with_type(CHANNEL_TYPE),
            handler(move |args: Value| {
                let store = Arc::clone(&store);
                async move {
                    let args = BatchGetArgs::parse(&args, Some(CHANNEL_TYPE))?;
                    entities_to_value(store.batch_get_channels(&args).await?)
                }
            }),
        )
        .await;
    }
}

// =============================================================================
// Whole-Adapter Registration
// =============================================================================

/// Register `get` and `set` for each type. This is all a reduced adapter
/// offers; any other command for these types has no handler.
pub async fn register_entity_store<S>(bus: &Bus, store: Arc<S>, types: &[String])
where
    S: EntityStore + ?Sized + 'static,
{
    for entity_type in types {
        register_get(bus, Arc::clone(&store), entity_type).await;
        register_set(bus, Arc::clone(&store), entity_type).await;
    }
    tracing::info!(store = store.name(), types = ?types, "registered entity store");
}

/// Register the full contract for each type.
pub async fn register_catalog_store<S>(bus: &Bus, store: Arc<S>, types: &[String], scan_default: usize)
where
    S: CatalogStore + ?Sized + 'static,
{
    for entity_type in types {
        register_get(bus, Arc::clone(&store), entity_type).await;
        register_set(bus, Arc::clone(&store), entity_type).await;
        register_remove(bus, Arc::clone(&store), entity_type).await;
        register_scan(bus, Arc::clone(&store), entity_type, scan_default).await;
    }
    let with_channel_variant = types.iter().any(|t| t == CHANNEL_TYPE);
    register_batch_get(bus, Arc::clone(&store), with_channel_variant).await;
    tracing::info!(store = store.name(), types = ?types, "registered catalog store");
}

//! Relationships - Expansion of `include` into `included`
//!
//! For each requested relation the entity actually has, every referenced
//! `{type, id}` is fetched concurrently in the parent's channel. Resolved
//! records are flattened, in include order then reference order, into
//! `included`. A reference that misses or fails is dropped.

use std::collections::HashSet;

use super::backend::EntityLookup;
use super::fanout;
use crate::entity::{Entity, EntityRef};

/// Populate `entity.included` for the relation names in `include`.
///
/// With an empty `include` the entity is returned untouched. Otherwise
/// `included` is always set, possibly to an empty list.
pub async fn expand<L>(lookup: &L, mut entity: Entity, include: &[String]) -> Entity
where
    L: EntityLookup + ?Sized,
{
    if include.is_empty() {
        return entity;
    }

    let mut seen = HashSet::new();
    let references: Vec<EntityRef> = include
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .filter_map(|name| entity.relationships.get(name))
        .flat_map(|relationship| relationship.refs().iter().cloned())
        .collect();

    // A channel's own relations point into that channel.
    let channel = if entity.is_channel() {
        entity.id.clone()
    } else {
        entity.channel.clone()
    };

    let included = fanout::isolated(lookup, channel.as_deref(), &references).await;
    tracing::debug!(
        requested = references.len(),
        resolved = included.len(),
        "expanded relationships"
    );
    entity.included = Some(included);
    entity
}

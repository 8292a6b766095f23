//! Fan-out - Concurrent key resolution
//!
//! Both joins issue every lookup at once. They differ in what one failure does:
//! - [`isolated`] settles each lookup independently and drops failures.
//! - [`all_or_nothing`] fails the whole batch on the first error.

use futures::future::{join_all, try_join_all};

use super::backend::EntityLookup;
use crate::entity::{Entity, EntityRef};
use crate::error::StoreResult;

/// Resolve `keys` concurrently; keep found records in key order, drop the rest.
pub async fn isolated<L>(lookup: &L, channel: Option<&str>, keys: &[EntityRef]) -> Vec<Entity>
where
    L: EntityLookup + ?Sized,
{
    let settled = join_all(keys.iter().map(|key| lookup.lookup(channel, key))).await;

    keys.iter()
        .zip(settled)
        .filter_map(|(key, result)| match result {
            Ok(Some(entity)) => Some(entity),
            Ok(None) => {
                tracing::debug!(%key, "batch key not found");
                None
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "batch key failed");
                None
            }
        })
        .collect()
}

/// Resolve `keys` concurrently; any error fails the batch. Misses are dropped.
///
/// # Errors
/// The first lookup error.
pub async fn all_or_nothing<L>(
    lookup: &L,
    channel: Option<&str>,
    keys: &[EntityRef],
) -> StoreResult<Vec<Entity>>
where
    L: EntityLookup + ?Sized,
{
    let found = try_join_all(keys.iter().map(|key| lookup.lookup(channel, key))).await?;
    Ok(found.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;

    /// Resolves ids starting with "ok", misses "missing*", fails everything else.
    struct Scripted;

    #[async_trait]
    impl EntityLookup for Scripted {
        async fn lookup(&self, _channel: Option<&str>, reference: &EntityRef) -> StoreResult<Option<Entity>> {
            if reference.id.starts_with("ok") {
                Ok(Some(Entity::new(reference.entity_type.clone()).with_id(reference.id.clone())))
            } else if reference.id.starts_with("missing") {
                Ok(None)
            } else {
                Err(StoreError::backend("scripted", "boom"))
            }
        }
    }

    fn keys(ids: &[&str]) -> Vec<EntityRef> {
        ids.iter().map(|id| EntityRef::new("video", *id)).collect()
    }

    #[tokio::test]
    async fn test_isolated_keeps_order_and_drops_failures() {
        let found = isolated(&Scripted, Some("c"), &keys(&["ok-1", "missing", "bad", "ok-2"])).await;
        let ids: Vec<_> = found.iter().map(|e| e.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
    }

    #[tokio::test]
    async fn test_all_or_nothing_fails_batch() {
        let err = all_or_nothing(&Scripted, None, &keys(&["ok-1", "bad"])).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));

        let found = all_or_nothing(&Scripted, None, &keys(&["ok-1", "missing"])).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}

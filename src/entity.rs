//! Entity - Typed, multi-tenant content records
//!
//! TigerStyle: Explicit types, validation, builder pattern.
//!
//! Four fields are reserved (`id`, `type`, `channel`, `relationships`) plus the
//! derived `included`. Everything else rides along in `attributes` untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{CHANNEL_TYPE, KEY_SEPARATOR};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// References
// =============================================================================

/// A `{type, id}` pointer to another entity. Pure data, never a live link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Referenced entity type
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Referenced entity id
    pub id: String,
}

impl EntityRef {
    /// Create a reference.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// A named relation: one reference or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relationship {
    /// Single reference
    One(EntityRef),
    /// Ordered references
    Many(Vec<EntityRef>),
}

impl Relationship {
    /// All references, the single case normalized to a one-element slice.
    #[must_use]
    pub fn refs(&self) -> &[EntityRef] {
        match self {
            Self::One(reference) => std::slice::from_ref(reference),
            Self::Many(references) => references,
        }
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A typed content record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Assigned by the store on first `set` when absent, then immutable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Discriminator selecting the table/bucket
    #[serde(rename = "type", default)]
    pub entity_type: String,
    /// Tenant partition; absent only for the channel type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Named references to other entities
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
    /// Expanded relationships; read-time only, never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Entity>>,
    /// Everything else, preserved verbatim
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Create an empty entity of the given type.
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Add a free-form attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Add a named relationship.
    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships.insert(name.into(), relationship);
        self
    }

    /// True for the tenant-root type.
    #[must_use]
    pub fn is_channel(&self) -> bool {
        self.entity_type == CHANNEL_TYPE
    }

    /// Get a free-form attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Assign a fresh UUID when no id is present. Returns true if one was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.as_deref().is_some_and(|id| !id.is_empty()) {
            return false;
        }
        self.id = Some(uuid::Uuid::new_v4().to_string());
        true
    }

    /// The copy that goes to storage: no `included`.
    #[must_use]
    pub fn stored_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.included = None;
        copy
    }

    /// Backend key for this entity.
    ///
    /// # Errors
    /// Fails when the id is missing, or the channel is missing for a non-channel type.
    pub fn key(&self) -> StoreResult<StoreKey> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| StoreError::missing(format!("{} entity has no id", self.entity_type)))?;
        StoreKey::new(&self.entity_type, self.channel.as_deref(), id)
    }

    /// Reference to this entity, if it has an id.
    #[must_use]
    pub fn reference(&self) -> Option<EntityRef> {
        self.id
            .as_ref()
            .map(|id| EntityRef::new(self.entity_type.clone(), id.clone()))
    }

    /// Serialize to a JSON value.
    ///
    /// # Errors
    /// Fails only if an attribute cannot be represented as JSON.
    pub fn to_value(&self) -> StoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a JSON value.
    ///
    /// # Errors
    /// Fails if reserved fields have the wrong shape.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

// =============================================================================
// Store Key
// =============================================================================

/// Backend key derived from `(channel, type, id)`.
///
/// Channels live in their own unpartitioned key space keyed by `id`; every
/// other type is keyed by `(channel, id)` with the channel as the partition
/// component so one channel's entities are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    /// Key of a channel record
    Channel {
        /// Channel id
        id: String,
    },
    /// Key of a content record inside a channel
    Content {
        /// Partition component
        channel: String,
        /// Sort component
        id: String,
    },
}

impl StoreKey {
    /// Build the key for a type.
    ///
    /// # Errors
    /// `MissingParameter` when `id` is empty or `channel` is absent for a
    /// non-channel type; `InvalidParameter` when either contains the reserved
    /// separator.
    pub fn new(entity_type: &str, channel: Option<&str>, id: &str) -> StoreResult<Self> {
        if id.is_empty() {
            return Err(StoreError::missing(format!("{entity_type} key requires an id")));
        }
        check_separator("id", id)?;

        if entity_type == CHANNEL_TYPE {
            return Ok(Self::Channel { id: id.to_string() });
        }

        let channel = channel
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StoreError::missing(format!("{entity_type} key requires a channel")))?;
        check_separator("channel", channel)?;

        Ok(Self::Content {
            channel: channel.to_string(),
            id: id.to_string(),
        })
    }

    /// The id component.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Channel { id } | Self::Content { id, .. } => id,
        }
    }

    /// The partition component, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Channel { .. } => None,
            Self::Content { channel, .. } => Some(channel),
        }
    }

    /// Single-string form for stores without compound keys: `channel:id` or `id`.
    #[must_use]
    pub fn composite(&self) -> String {
        match self {
            Self::Channel { id } => id.clone(),
            Self::Content { channel, id } => format!("{channel}{KEY_SEPARATOR}{id}"),
        }
    }

    /// Inverse of [`StoreKey::composite`].
    ///
    /// # Errors
    /// Fails when a non-channel key has no separator.
    pub fn parse_composite(entity_type: &str, raw: &str) -> StoreResult<Self> {
        if entity_type == CHANNEL_TYPE {
            return Self::new(entity_type, None, raw);
        }
        let (channel, id) = raw.split_once(KEY_SEPARATOR).ok_or_else(|| {
            StoreError::invalid(format!("{entity_type} key {raw:?} has no channel component"))
        })?;
        Self::new(entity_type, Some(channel), id)
    }

    /// Reject a raw `id` or `channel` holding the reserved separator.
    ///
    /// # Errors
    /// `InvalidParameter` when `value` contains the separator.
    pub fn check_component(field: &str, value: &str) -> StoreResult<()> {
        check_separator(field, value)
    }

    /// Prefix shared by every composite key in a channel.
    #[must_use]
    pub fn channel_prefix(channel: &str) -> String {
        format!("{channel}{KEY_SEPARATOR}")
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.composite())
    }
}

fn check_separator(field: &str, value: &str) -> StoreResult<()> {
    if value.contains(KEY_SEPARATOR) {
        return Err(StoreError::invalid(format!(
            "{field} {value:?} contains reserved separator {KEY_SEPARATOR:?}"
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_json_shape() {
        let value = json!({
            "id": "v1",
            "type": "video",
            "channel": "oddnews",
            "title": "Launch",
            "meta": {"duration": 120},
            "relationships": {
                "collection": {"type": "collection", "id": "c1"},
                "related": [{"type": "video", "id": "v2"}, {"type": "video", "id": "v3"}]
            }
        });

        let entity = Entity::from_value(value.clone()).unwrap();
        assert_eq!(entity.id.as_deref(), Some("v1"));
        assert_eq!(entity.entity_type, "video");
        assert_eq!(entity.attribute("title"), Some(&json!("Launch")));
        assert_eq!(entity.relationships["collection"].refs().len(), 1);
        assert_eq!(entity.relationships["related"].refs()[1].id, "v3");

        assert_eq!(entity.to_value().unwrap(), value);
    }

    #[test]
    fn test_included_not_stored() {
        let mut entity = Entity::new("video").with_id("v1").with_channel("oddnews");
        entity.included = Some(vec![Entity::new("collection").with_id("c1")]);

        let stored = entity.stored_copy();
        assert!(stored.included.is_none());
        assert!(stored.to_value().unwrap().get("included").is_none());
    }

    #[test]
    fn test_ensure_id_once() {
        let mut entity = Entity::new("video");
        assert!(entity.ensure_id());
        let first = entity.id.clone();
        assert!(!entity.ensure_id());
        assert_eq!(entity.id, first);

        let mut named = Entity::new("video").with_id("keep-me");
        assert!(!named.ensure_id());
        assert_eq!(named.id.as_deref(), Some("keep-me"));
    }

    #[test]
    fn test_store_key_scheme() {
        let key = StoreKey::new("video", Some("oddnews"), "v1").unwrap();
        assert_eq!(key.channel(), Some("oddnews"));
        assert_eq!(key.composite(), "oddnews:v1");
        assert_eq!(StoreKey::parse_composite("video", "oddnews:v1").unwrap(), key);

        let channel = StoreKey::new("channel", None, "oddnews").unwrap();
        assert_eq!(channel.composite(), "oddnews");
        assert_eq!(channel.channel(), None);
    }

    #[test]
    fn test_store_key_validation() {
        assert!(matches!(
            StoreKey::new("video", None, "v1"),
            Err(StoreError::MissingParameter { .. })
        ));
        assert!(matches!(
            StoreKey::new("video", Some(""), "v1"),
            Err(StoreError::MissingParameter { .. })
        ));
        assert!(matches!(
            StoreKey::new("video", Some("odd:news"), "v1"),
            Err(StoreError::InvalidParameter { .. })
        ));
        assert!(matches!(
            StoreKey::new("channel", None, ""),
            Err(StoreError::MissingParameter { .. })
        ));
    }
}

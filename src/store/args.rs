//! Args - Parsing and validation of store arguments
//!
//! TigerStyle: Validate everything before the first backend call.
//!
//! Bus arguments arrive as JSON. Each parser checks the shape, applies the
//! channel rule (required for every type except `channel`) and returns a typed
//! argument struct. Failures are `MissingParameter` or `InvalidParameter`.

use serde_json::{Map, Value};

use crate::constants::{CHANNEL_TYPE, SCAN_LIMIT_MAX};
use crate::entity::{Entity, EntityRef, StoreKey};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Get
// =============================================================================

/// Arguments of `get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetArgs {
    /// Record id. Only the Riak-class listing form omits it.
    pub id: Option<String>,
    /// Partition; ignored for the channel type
    pub channel: Option<String>,
    /// Relation names to expand into `included`
    pub include: Vec<String>,
}

impl GetArgs {
    /// Get by id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set the channel.
    #[must_use]
    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Set the relations to expand.
    #[must_use]
    pub fn including<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Parse bus arguments. `id` may be absent here; adapters that need it
    /// call [`GetArgs::key`].
    ///
    /// # Errors
    /// Parameter errors for a non-object, bad channel, or non-array include.
    pub fn parse(entity_type: &str, args: &Value) -> StoreResult<Self> {
        let op = format!("get({entity_type})");
        let object = as_object(&op, args)?;
        let channel = channel_field(entity_type, &op, object)?;
        let id = optional_string(&op, object, "id")?;
        let include = include_field(&op, object)?;

        Ok(Self {
            id,
            channel,
            include,
        })
    }

    /// Backend key; requires `id`.
    ///
    /// # Errors
    /// `MissingParameter` without an id or (non-channel types) a channel.
    pub fn key(&self, entity_type: &str) -> StoreResult<StoreKey> {
        let id = self
            .id
            .as_deref()
            .ok_or_else(|| StoreError::missing(format!("get({entity_type}) requires id")))?;
        StoreKey::new(entity_type, self.channel.as_deref(), id)
    }
}

// =============================================================================
// Remove
// =============================================================================

/// Arguments of `remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyArgs {
    /// Record id
    pub id: String,
    /// Partition; ignored for the channel type
    pub channel: Option<String>,
}

impl KeyArgs {
    /// Key args for a record.
    #[must_use]
    pub fn new(id: impl Into<String>, channel: Option<&str>) -> Self {
        Self {
            id: id.into(),
            channel: channel.map(str::to_string),
        }
    }

    /// Parse bus arguments.
    ///
    /// # Errors
    /// Parameter errors for a missing id or channel.
    pub fn parse(entity_type: &str, args: &Value) -> StoreResult<Self> {
        let op = format!("remove({entity_type})");
        let object = as_object(&op, args)?;
        let channel = channel_field(entity_type, &op, object)?;
        let id = optional_string(&op, object, "id")?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::missing(format!("{op} requires id")))?;
        Ok(Self { id, channel })
    }

    /// Backend key.
    ///
    /// # Errors
    /// Key scheme violations.
    pub fn key(&self, entity_type: &str) -> StoreResult<StoreKey> {
        StoreKey::new(entity_type, self.channel.as_deref(), &self.id)
    }
}

// =============================================================================
// Scan
// =============================================================================

/// Arguments of `scan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanArgs {
    /// Partition to scan; `None` only for the channel type
    pub channel: Option<String>,
    /// Hard cap on returned records
    pub limit: usize,
}

impl ScanArgs {
    /// Scan a channel.
    #[must_use]
    pub fn new(channel: Option<&str>, limit: usize) -> Self {
        Self {
            channel: channel.map(str::to_string),
            limit,
        }
    }

    /// Parse bus arguments, applying `default_limit` when no limit is given.
    ///
    /// # Errors
    /// Parameter errors for a bad channel (including one that holds the key
    /// separator) or a limit that is not a positive integer.
    pub fn parse(entity_type: &str, args: &Value, default_limit: usize) -> StoreResult<Self> {
        let op = format!("scan({entity_type})");
        let object = as_object(&op, args)?;
        let channel = channel_field(entity_type, &op, object)?;
        if let Some(channel) = channel.as_deref() {
            StoreKey::check_component("channel", channel)?;
        }

        let limit = match object.get("limit") {
            None | Some(Value::Null) => default_limit,
            Some(value) => value
                .as_u64()
                .filter(|limit| *limit > 0)
                .and_then(|limit| usize::try_from(limit).ok())
                .ok_or_else(|| {
                    StoreError::invalid(format!("{op} limit must be a positive integer"))
                })?,
        };

        Ok(Self {
            channel,
            limit: limit.min(SCAN_LIMIT_MAX),
        })
    }
}

// =============================================================================
// Batch Get
// =============================================================================

/// Arguments of `batchGet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetArgs {
    /// Channel every key resolves against; absent for channel records
    pub channel: Option<String>,
    /// Keys in caller order
    pub keys: Vec<EntityRef>,
}

impl BatchGetArgs {
    /// Batch of keys in one channel.
    #[must_use]
    pub fn new(channel: Option<&str>, keys: Vec<EntityRef>) -> Self {
        Self {
            channel: channel.map(str::to_string),
            keys,
        }
    }

    /// Parse bus arguments. A key without `type` takes `default_type`
    /// (the pattern's type, when the pattern names one). Entries without a
    /// usable type/id are dropped, like keys that fail to resolve.
    ///
    /// # Errors
    /// `InvalidParameter` when `keys` is not an array; `MissingParameter` when
    /// `keys` is absent.
    pub fn parse(args: &Value, default_type: Option<&str>) -> StoreResult<Self> {
        let op = "batchGet()";
        let object = as_object(op, args)?;
        let channel = optional_string(op, object, "channel")?;

        let raw_keys = match object.get("keys") {
            None | Some(Value::Null) => {
                return Err(StoreError::missing(format!("{op} requires keys")))
            }
            Some(Value::Array(keys)) => keys,
            Some(_) => return Err(StoreError::invalid(format!("{op} keys must be an array"))),
        };

        let keys = raw_keys
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match parse_key(raw, default_type) {
                Ok(key) => Some(key),
                Err(reason) => {
                    tracing::debug!(index, reason, "batchGet key dropped");
                    None
                }
            })
            .collect();

        Ok(Self { channel, keys })
    }
}

fn parse_key(raw: &Value, default_type: Option<&str>) -> Result<EntityRef, &'static str> {
    let object = raw.as_object().ok_or("not an object")?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or("no string id")?;
    let entity_type = match object.get("type") {
        Some(Value::String(t)) => t.as_str(),
        None | Some(Value::Null) => default_type.ok_or("no type")?,
        Some(_) => return Err("type is not a string"),
    };
    Ok(EntityRef::new(entity_type, id))
}

// =============================================================================
// Set
// =============================================================================

/// Parse a `set` payload into an entity of `entity_type`.
///
/// The pattern's type always wins over a `type` field in the payload.
///
/// # Errors
/// Parameter errors for a non-object payload, bad channel, non-string id, or
/// malformed relationships.
pub fn parse_payload(entity_type: &str, payload: Value) -> StoreResult<Entity> {
    let op = format!("set({entity_type})");
    {
        let object = as_object(&op, &payload)?;
        channel_field(entity_type, &op, object)?;
        optional_string(&op, object, "id")?;
    }

    let mut entity = Entity::from_value(payload)
        .map_err(|e| StoreError::invalid(format!("{op} payload: {e}")))?;
    entity.entity_type = entity_type.to_string();
    Ok(entity)
}

/// Check the channel rule on an already-typed entity.
///
/// # Errors
/// `MissingParameter` when a non-channel entity has no channel.
pub fn check_entity_channel(entity: &Entity) -> StoreResult<()> {
    if entity.is_channel() {
        return Ok(());
    }
    match entity.channel.as_deref() {
        Some(channel) if !channel.is_empty() => Ok(()),
        _ => Err(StoreError::missing(format!(
            "set({}) requires channel",
            entity.entity_type
        ))),
    }
}

// =============================================================================
// Field Helpers
// =============================================================================

fn as_object<'a>(op: &str, args: &'a Value) -> StoreResult<&'a Map<String, Value>> {
    args.as_object()
        .ok_or_else(|| StoreError::invalid(format!("{op} arguments must be an object")))
}

fn optional_string(op: &str, object: &Map<String, Value>, field: &str) -> StoreResult<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(StoreError::invalid(format!("{op} {field} must be a string"))),
    }
}

fn channel_field(
    entity_type: &str,
    op: &str,
    object: &Map<String, Value>,
) -> StoreResult<Option<String>> {
    if entity_type == CHANNEL_TYPE {
        return Ok(None);
    }
    match object.get("channel") {
        Some(Value::String(channel)) if !channel.is_empty() => Ok(Some(channel.clone())),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(StoreError::missing(format!("{op} requires channel")))
        }
        Some(_) => Err(StoreError::invalid(format!("{op} channel must be a string"))),
    }
}

fn include_field(op: &str, object: &Map<String, Value>) -> StoreResult<Vec<String>> {
    let raw = match object.get("include") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(raw)) => raw,
        Some(_) => return Err(StoreError::invalid(format!("{op} include must be an array"))),
    };
    raw.iter()
        .map(|name| {
            name.as_str()
                .map(str::to_string)
                .ok_or_else(|| StoreError::invalid(format!("{op} include entries must be strings")))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

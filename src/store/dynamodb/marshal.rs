//! Marshaling between entities and DynamoDB items
//!
//! Entities go through their JSON form, so every attribute (nested
//! relationships included) round-trips. Numbers travel as decimal text and
//! come back as the narrowest JSON number that parses.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Number, Value};

use super::types::{AttributeValue, Item};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};

/// Entity to item. `included` must already be stripped.
///
/// # Errors
/// Fails if the entity does not serialize to a JSON object.
pub fn marshal(entity: &Entity) -> StoreResult<Item> {
    match entity.to_value()? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(name, value)| (name, to_attribute(value)))
            .collect()),
        other => Err(StoreError::Serialization(format!(
            "entity serialized to {other}, expected an object"
        ))),
    }
}

/// Item to entity.
///
/// # Errors
/// Fails on malformed numbers, unknown attribute kinds, or reserved fields of
/// the wrong shape.
pub fn unmarshal(item: Item) -> StoreResult<Entity> {
    let fields = item
        .into_iter()
        .map(|(name, value)| Ok((name, from_attribute(value)?)))
        .collect::<StoreResult<Map<String, Value>>>()?;
    Entity::from_value(Value::Object(fields))
}

/// JSON value to attribute value.
#[must_use]
pub fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

/// Attribute value to JSON value. Binary becomes base64 text; sets become arrays.
///
/// # Errors
/// Fails when an `N` or `NS` member is not a number, or on an attribute kind
/// newer than this crate.
pub fn from_attribute(value: AttributeValue) -> StoreResult<Value> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(parse_number(&n)?),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::String(BASE64.encode(blob.into_inner())),
        AttributeValue::Ss(strings) => Value::Array(strings.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(numbers) => Value::Array(
            numbers
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<StoreResult<_>>()?,
        ),
        AttributeValue::Bs(blobs) => Value::Array(
            blobs
                .into_iter()
                .map(|blob| Value::String(BASE64.encode(blob.into_inner())))
                .collect(),
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<StoreResult<_>>()?,
        ),
        AttributeValue::M(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| Ok((name, from_attribute(value)?)))
                .collect::<StoreResult<_>>()?,
        ),
        other => {
            return Err(StoreError::Serialization(format!(
                "unsupported attribute value {other:?}"
            )))
        }
    })
}

fn parse_number(text: &str) -> StoreResult<Number> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(n.into());
    }
    if let Ok(n) = text.parse::<u64>() {
        return Ok(n.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| StoreError::Serialization(format!("invalid number attribute {text:?}")))
}

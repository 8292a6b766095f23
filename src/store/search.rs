//! `SearchIndexStore` - Text index with cross-store materialization
//!
//! TigerStyle: Holds ids, never entities.
//!
//! `index` maps free text to an id within one type. `query` turns text into
//! ranked `{type, id}` candidates, then asks the bus for a `batchGet` so the
//! adapter that owns the records materializes them:
//!
//! ```text
//! query ──► candidates ──► bus batchGet ──► compacted entities
//! ```
//!
//! Ranking: most distinct matching tokens first, then first-indexed first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::bus::{handler, Bus, Pattern};
use crate::constants::{CMD_BATCH_GET, CMD_INDEX, CMD_QUERY, SEARCH_RESULTS_COUNT_MAX};
use crate::entity::EntityRef;
use crate::error::{StoreError, StoreResult};

/// Lowercased alphanumeric runs of `text`.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

// =============================================================================
// Index
// =============================================================================

#[derive(Debug)]
struct Document {
    sequence: u64,
    tokens: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct TypeIndex {
    documents: HashMap<String, Document>,
    postings: HashMap<String, HashSet<String>>,
}

impl TypeIndex {
    fn unlink(&mut self, id: &str, tokens: &BTreeSet<String>) {
        for token in tokens {
            if let Some(ids) = self.postings.get_mut(token) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(token);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct IndexState {
    types: HashMap<String, TypeIndex>,
    next_sequence: u64,
}

/// Parsed `query` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free text
    pub text: String,
    /// Only this type, when given
    pub entity_type: Option<String>,
    /// Channel forwarded to `batchGet`
    pub channel: Option<String>,
}

impl SearchQuery {
    /// Query over every indexed type.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Restrict to one type.
    #[must_use]
    pub fn of_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Materialize within one channel.
    #[must_use]
    pub fn in_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Parse bus arguments `{query, type?, channel?}`.
    ///
    /// # Errors
    /// `MissingParameter` without `query`; `InvalidParameter` for non-string fields.
    pub fn parse(args: &Value) -> StoreResult<Self> {
        let field = |name: &str| match args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::invalid(format!("query() {name} must be a string"))),
        };
        let text = field("query")?.ok_or_else(|| StoreError::missing("query() requires query"))?;
        Ok(Self {
            text,
            entity_type: field("type")?,
            channel: field("channel")?,
        })
    }
}

/// Text index over a fixed set of types.
#[derive(Debug)]
pub struct SearchIndexStore {
    types: Vec<String>,
    target_store: Option<String>,
    state: RwLock<IndexState>,
}

impl SearchIndexStore {
    /// Index `types`; materialize through the generic `batchGet`.
    #[must_use]
    pub fn new(types: &[String]) -> Self {
        Self {
            types: types.to_vec(),
            target_store: None,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Materialize through `{cmd:'batchGet', store}` instead of the generic pattern.
    #[must_use]
    pub fn with_target_store(mut self, store: impl Into<String>) -> Self {
        self.target_store = Some(store.into());
        self
    }

    /// Indexed types.
    #[must_use]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Associate `text` with `id`, replacing earlier text. Empty text drops
    /// the id. Returns whether the id is indexed afterwards.
    ///
    /// # Errors
    /// `MissingParameter` for an empty id; `InvalidParameter` for an unindexed type.
    #[tracing::instrument(skip(self, text))]
    pub async fn index(&self, entity_type: &str, id: &str, text: &str) -> StoreResult<bool> {
        if id.is_empty() {
            return Err(StoreError::missing(format!("index({entity_type}) requires id")));
        }
        if !self.types.iter().any(|t| t == entity_type) {
            return Err(StoreError::invalid(format!("type {entity_type} is not indexed")));
        }
        let tokens: BTreeSet<String> = tokenize(text).collect();

        let mut state = self.state.write().await;
        let sequence = state.next_sequence;
        let index = state.types.entry(entity_type.to_string()).or_default();

        let previous = index.documents.remove(id);
        if let Some(previous) = &previous {
            index.unlink(id, &previous.tokens);
        }
        if tokens.is_empty() {
            return Ok(false);
        }

        for token in &tokens {
            index
                .postings
                .entry(token.clone())
                .or_default()
                .insert(id.to_string());
        }
        // Re-indexing keeps the original position.
        let sequence = previous.map_or(sequence, |p| p.sequence);
        index.documents.insert(id.to_string(), Document { sequence, tokens });
        if sequence == state.next_sequence {
            state.next_sequence += 1;
        }
        Ok(true)
    }

    /// Ranked candidate keys for `query`, at most `SEARCH_RESULTS_COUNT_MAX`.
    pub async fn candidates(&self, query: &SearchQuery) -> Vec<EntityRef> {
        let wanted: BTreeSet<String> = tokenize(&query.text).collect();
        let state = self.state.read().await;

        let mut scored: HashMap<(&str, &str), usize> = HashMap::new();
        for (entity_type, index) in &state.types {
            if query.entity_type.as_deref().is_some_and(|t| t != entity_type.as_str()) {
                continue;
            }
            for token in &wanted {
                for id in index.postings.get(token).into_iter().flatten() {
                    *scored.entry((entity_type.as_str(), id.as_str())).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(usize, u64, EntityRef)> = scored
            .into_iter()
            .filter_map(|((entity_type, id), score)| {
                let sequence = state.types.get(entity_type)?.documents.get(id)?.sequence;
                Some((score, sequence, EntityRef::new(entity_type, id)))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked.truncate(SEARCH_RESULTS_COUNT_MAX);
        ranked.into_iter().map(|(_, _, key)| key).collect()
    }

    /// Search, then materialize the candidates through the bus.
    ///
    /// # Errors
    /// `NoHandler` when no `batchGet` is registered; errors from the batch.
    #[tracing::instrument(skip(self, bus))]
    pub async fn query(&self, bus: &Bus, query: &SearchQuery) -> StoreResult<Value> {
        let keys = self.candidates(query).await;
        if keys.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let mut pattern = Pattern::store(CMD_BATCH_GET);
        if let Some(store) = &self.target_store {
            pattern = pattern.with_store(store.clone());
        }
        let mut args = json!({ "keys": keys });
        if let Some(channel) = &query.channel {
            args["channel"] = json!(channel);
        }

        let found = bus.query(&pattern, args).await?;
        let entities = match found {
            Value::Array(values) => values.into_iter().filter(|v| !v.is_null()).collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        };
        tracing::debug!(candidates = keys.len(), found = entities.len(), "search materialized");
        Ok(Value::Array(entities))
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Register `index` per indexed type and the type-agnostic `query`.
pub async fn register(bus: &Bus, store: Arc<SearchIndexStore>) {
    for entity_type in store.types() {
        let store = Arc::clone(&store);
        let owned_type = entity_type.clone();
        bus.command_handler(
            Pattern::store(CMD_INDEX).with_type(entity_type.clone()),
            handler(move |payload: Value| {
                let store = Arc::clone(&store);
                let entity_type = owned_type.clone();
                async move {
                    let id = payload.get("id").and_then(Value::as_str).unwrap_or_default();
                    let text = match payload.get("text") {
                        None | Some(Value::Null) => "",
                        Some(Value::String(text)) => text.as_str(),
                        Some(_) => {
                            return Err(StoreError::invalid(format!(
                                "index({entity_type}) text must be a string"
                            )))
                        }
                    };
                    Ok(Value::Bool(store.index(&entity_type, id, text).await?))
                }
            }),
        )
        .await;
    }

    let lookup_bus = bus.clone();
    let query_store = Arc::clone(&store);
    bus.query_handler(
        Pattern::store(CMD_QUERY),
        handler(move |args: Value| {
            let store = Arc::clone(&query_store);
            let bus = lookup_bus.clone();
            async move {
                let query = SearchQuery::parse(&args)?;
                store.query(&bus, &query).await
            }
        }),
    )
    .await;
    tracing::info!(types = ?store.types(), "registered search index");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn types() -> Vec<String> {
        vec!["video".to_string(), "collection".to_string()]
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Rocket-Launch, 2024!").collect();
        assert_eq!(tokens, vec!["rocket", "launch", "2024"]);
    }

    #[tokio::test]
    async fn test_rank_by_matches_then_index_order() {
        let index = SearchIndexStore::new(&types());
        index.index("video", "v1", "rocket").await.unwrap();
        index.index("video", "v2", "rocket launch").await.unwrap();
        index.index("collection", "c1", "rocket").await.unwrap();

        let found = index.candidates(&SearchQuery::new("launch rocket")).await;
        assert_eq!(
            found,
            vec![
                EntityRef::new("video", "v2"),
                EntityRef::new("video", "v1"),
                EntityRef::new("collection", "c1"),
            ]
        );

        let videos = index.candidates(&SearchQuery::new("rocket").of_type("collection")).await;
        assert_eq!(videos, vec![EntityRef::new("collection", "c1")]);
    }

    #[tokio::test]
    async fn test_reindex_and_remove() {
        let index = SearchIndexStore::new(&types());
        index.index("video", "v1", "rocket").await.unwrap();
        index.index("video", "v2", "rocket").await.unwrap();
        assert!(index.index("video", "v1", "cooking show").await.unwrap());

        assert_eq!(
            index.candidates(&SearchQuery::new("rocket")).await,
            vec![EntityRef::new("video", "v2")]
        );
        assert!(!index.index("video", "v1", "").await.unwrap());
        assert!(index.candidates(&SearchQuery::new("cooking")).await.is_empty());
    }

    #[tokio::test]
    async fn test_unindexed_type_rejected() {
        let index = SearchIndexStore::new(&types());
        let err = index.index("promotion", "p1", "sale").await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_query_goes_through_store_scoped_batch_get() {
        let bus = Bus::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        bus.query_handler(
            Pattern::store(CMD_BATCH_GET).with_store("dynamodb"),
            handler(move |args: Value| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.write().await.push(args.clone());
                    Ok(json!([{"type": "video", "id": "v1", "channel": "oddnews"}, null]))
                }
            }),
        )
        .await;

        let index = Arc::new(SearchIndexStore::new(&types()).with_target_store("dynamodb"));
        register(&bus, Arc::clone(&index)).await;
        bus.command(&Pattern::store(CMD_INDEX).with_type("video"), json!({"id": "v1", "text": "Launch"}))
            .await
            .unwrap();

        let found = bus
            .query(&Pattern::store(CMD_QUERY), json!({"query": "launch", "channel": "oddnews"}))
            .await
            .unwrap();
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let calls = seen.read().await;
        assert_eq!(calls[0]["channel"], json!("oddnews"));
        assert_eq!(calls[0]["keys"], json!([{"type": "video", "id": "v1"}]));
    }

    #[tokio::test]
    async fn test_query_without_batch_get_is_no_handler() {
        let bus = Bus::new();
        let index = Arc::new(SearchIndexStore::new(&types()));
        register(&bus, Arc::clone(&index)).await;
        index.index("video", "v1", "launch").await.unwrap();

        let err = bus
            .query(&Pattern::store(CMD_QUERY), json!({"query": "launch"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoHandler { .. }));
    }
}

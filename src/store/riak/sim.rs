//! `SimRiakClient` - In-process Riak for testing
//!
//! TigerStyle: Deterministic buckets with fault injection.
//!
//! Each bucket doubles as its own search index. Search matches query tokens
//! against the requested fields and scores a hit by how many distinct tokens
//! it contains, the way a Solr `OR` query would rank them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::{RiakClient, RiakError, SearchRequest};
use crate::entity::StoreKey;
use crate::fault::FaultInjector;
use crate::store::search::tokenize;

type Bucket = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct SimState {
    buckets: RwLock<HashMap<String, Bucket>>,
    faults: FaultInjector,
}

/// Simulated Riak client.
#[derive(Debug, Clone, Default)]
pub struct SimRiakClient {
    state: Arc<SimState>,
}

impl SimRiakClient {
    /// Client with no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client whose calls consult `faults` first.
    #[must_use]
    pub fn with_faults(faults: FaultInjector) -> Self {
        Self {
            state: Arc::new(SimState {
                buckets: RwLock::new(HashMap::new()),
                faults,
            }),
        }
    }

    /// Keys currently in `bucket`.
    #[must_use]
    pub fn key_count(&self, bucket: &str) -> usize {
        let buckets = self.state.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.get(bucket).map_or(0, BTreeMap::len)
    }

    fn check_fault(&self, operation: &str) -> Result<(), RiakError> {
        match self.state.faults.should_inject(operation) {
            Some(fault) => Err(RiakError::new(operation, format!("simulated {fault}"))),
            None => Ok(()),
        }
    }
}

fn hit_score(value: &Value, fields: &[String], wanted: &BTreeSet<String>) -> usize {
    let found: BTreeSet<String> = fields
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .flat_map(tokenize)
        .collect();
    wanted.intersection(&found).count()
}

#[async_trait]
impl RiakClient for SimRiakClient {
    async fn fetch_value(&self, bucket: &str, key: &str) -> Result<Option<Value>, RiakError> {
        self.check_fault("fetch_value")?;
        let buckets = self.state.buckets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
    }

    async fn store_value(&self, bucket: &str, key: &str, value: Value) -> Result<(), RiakError> {
        self.check_fault("store_value")?;
        let mut buckets = self.state.buckets.write().unwrap_or_else(PoisonError::into_inner);
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_value(&self, bucket: &str, key: &str) -> Result<(), RiakError> {
        self.check_fault("delete_value")?;
        let mut buckets = self.state.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(b) = buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, RiakError> {
        self.check_fault("list_keys")?;
        let buckets = self.state.buckets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, RiakError> {
        self.check_fault("search")?;
        let wanted: BTreeSet<String> = tokenize(&request.text).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let prefix = request.channel.as_deref().map(StoreKey::channel_prefix);

        let buckets = self.state.buckets.read().unwrap_or_else(PoisonError::into_inner);
        let Some(bucket) = buckets.get(&request.index) else {
            return Err(RiakError::new("search", format!("no index {}", request.index)));
        };

        let mut hits: Vec<(usize, &String, &Value)> = bucket
            .iter()
            .filter(|(key, _)| prefix.as_deref().map_or(true, |p| key.starts_with(p)))
            .map(|(key, value)| (hit_score(value, &request.fields, &wanted), key, value))
            .filter(|(score, _, _)| *score > 0)
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        Ok(hits
            .into_iter()
            .take(request.rows)
            .map(|(score, key, value)| {
                let mut doc = json!({
                    "_yz_rb": request.index,
                    "_yz_rk": key,
                    "score": score,
                });
                for field in request.fields.iter().map(String::as_str).chain(["id", "channel"]) {
                    if let Some(v) = value.get(field) {
                        doc[field] = v.clone();
                    }
                }
                doc
            })
            .collect())
    }
}

//! `SimDynamoClient` - In-process DynamoDB for testing
//!
//! TigerStyle: Deterministic tables with fault injection.
//!
//! Items are kept in a `BTreeMap` ordered by `(hash, range)`, so query and
//! scan order is stable for a fixed set of items. Unknown tables fail with
//! `ResourceNotFoundException` like the real service.
//!
//! The client always offers callback calls; unless built with
//! [`SimDynamoClient::callback_only`] it also offers awaitable ones.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::client::{Callback, DynamoClient, PromiseDynamoClient};
use super::types::{
    ClientError, DeleteItemInput, DeleteItemOutput, GetItemInput, GetItemOutput,
    Item, ItemsOutput, PutItemInput, PutItemOutput, QueryInput, ScanInput, TableSchema,
};
use crate::fault::{FaultInjector, FaultType};

const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const VALIDATION: &str = "ValidationException";

#[derive(Debug)]
struct SimTable {
    schema: TableSchema,
    items: BTreeMap<(String, String), Item>,
}

impl SimTable {
    fn key_of(&self, item: &Item) -> Result<(String, String), ClientError> {
        let attribute = |name: &str| {
            item.get(name)
                .and_then(|value| value.as_s().ok())
                .cloned()
                .ok_or_else(|| {
                    ClientError::new(
                        VALIDATION,
                        format!("{} key attribute {name} missing or not a string", self.schema.table_name),
                    )
                })
        };

        let hash = attribute(&self.schema.hash_key)?;
        let range = match &self.schema.range_key {
            Some(range_key) => attribute(range_key)?,
            None => String::new(),
        };
        Ok((hash, range))
    }
}

#[derive(Debug, Default)]
struct SimState {
    tables: RwLock<HashMap<String, SimTable>>,
    faults: FaultInjector,
}

/// Simulated DynamoDB client.
#[derive(Debug, Clone)]
pub struct SimDynamoClient {
    state: Arc<SimState>,
    promise: bool,
}

impl Default for SimDynamoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDynamoClient {
    /// Client with both call flavors and no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(FaultInjector::default())
    }

    /// Client whose calls consult `faults` first.
    #[must_use]
    pub fn with_faults(faults: FaultInjector) -> Self {
        Self {
            state: Arc::new(SimState {
                tables: RwLock::new(HashMap::new()),
                faults,
            }),
            promise: true,
        }
    }

    /// Drop the awaitable flavor; only callback calls remain.
    #[must_use]
    pub fn callback_only(mut self) -> Self {
        self.promise = false;
        self
    }

    /// Create a table. Existing tables are left as they are.
    pub fn create_table(&self, schema: TableSchema) {
        let mut tables = self.state.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .entry(schema.table_name.clone())
            .or_insert_with(|| SimTable {
                schema,
                items: BTreeMap::new(),
            });
    }

    /// Items currently in `table_name` (0 for unknown tables).
    #[must_use]
    pub fn item_count(&self, table_name: &str) -> usize {
        let tables = self.state.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(table_name).map_or(0, |table| table.items.len())
    }

    /// Faults injected so far.
    #[must_use]
    pub fn injected_faults(&self) -> u64 {
        self.state.faults.total_injections()
    }

    fn check_fault(&self, operation: &str) -> Result<(), ClientError> {
        match self.state.faults.should_inject(operation) {
            None => Ok(()),
            Some(FaultType::Throttle) => Err(ClientError::new(
                "ProvisionedThroughputExceededException",
                format!("simulated throttle during {operation}"),
            )),
            Some(fault) => Err(ClientError::new(
                "InternalServerError",
                format!("simulated {fault} during {operation}"),
            )),
        }
    }

    fn with_table<T>(
        &self,
        table_name: &str,
        f: impl FnOnce(&mut SimTable) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let mut tables = self.state.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.get_mut(table_name).ok_or_else(|| {
            ClientError::new(RESOURCE_NOT_FOUND, format!("table {table_name} does not exist"))
        })?;
        f(table)
    }

    fn do_put(&self, input: PutItemInput) -> Result<PutItemOutput, ClientError> {
        self.check_fault("put_item")?;
        self.with_table(&input.table_name, |table| {
            let key = table.key_of(&input.item)?;
            table.items.insert(key, input.item);
            Ok(PutItemOutput {})
        })
    }

    fn do_get(&self, input: GetItemInput) -> Result<GetItemOutput, ClientError> {
        self.check_fault("get_item")?;
        self.with_table(&input.table_name, |table| {
            let key = table.key_of(&input.key)?;
            Ok(GetItemOutput {
                item: table.items.get(&key).cloned(),
            })
        })
    }

    fn do_delete(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, ClientError> {
        self.check_fault("delete_item")?;
        self.with_table(&input.table_name, |table| {
            let key = table.key_of(&input.key)?;
            Ok(DeleteItemOutput {
                attributes: table.items.remove(&key),
            })
        })
    }

    fn do_query(&self, input: QueryInput) -> Result<ItemsOutput, ClientError> {
        self.check_fault("query")?;
        self.with_table(&input.table_name, |table| {
            if table.schema.hash_key != input.hash_key {
                return Err(ClientError::new(
                    VALIDATION,
                    format!("{} is not the partition key of {}", input.hash_key, input.table_name),
                ));
            }
            let hash = input.hash_value.as_s().map_err(|_| {
                ClientError::new(VALIDATION, "partition key value must be a string")
            })?;
            let matching = table
                .items
                .range((hash.to_string(), String::new())..)
                .take_while(|((item_hash, _), _)| item_hash == hash)
                .map(|(_, item)| item.clone());
            Ok(page(matching, input.limit, table))
        })
    }

    fn do_scan(&self, input: ScanInput) -> Result<ItemsOutput, ClientError> {
        self.check_fault("scan")?;
        self.with_table(&input.table_name, |table| {
            let all = table.items.values().cloned();
            Ok(page(all, input.limit, table))
        })
    }
}

fn page(items: impl Iterator<Item = Item>, limit: Option<usize>, table: &SimTable) -> ItemsOutput {
    let mut items: Vec<Item> = items.collect();
    let mut last_evaluated_key = None;
    if let Some(limit) = limit {
        if items.len() > limit {
            items.truncate(limit);
            last_evaluated_key = items.last().map(|item| {
                let mut key = Item::new();
                for name in std::iter::once(&table.schema.hash_key).chain(table.schema.range_key.as_ref()) {
                    if let Some(value) = item.get(name) {
                        key.insert(name.clone(), value.clone());
                    }
                }
                key
            });
        }
    }
    ItemsOutput {
        items,
        last_evaluated_key,
    }
}

impl DynamoClient for SimDynamoClient {
    fn put_item(&self, input: PutItemInput, done: Callback<PutItemOutput>) {
        done(self.do_put(input));
    }

    fn get_item(&self, input: GetItemInput, done: Callback<GetItemOutput>) {
        done(self.do_get(input));
    }

    fn delete_item(&self, input: DeleteItemInput, done: Callback<DeleteItemOutput>) {
        done(self.do_delete(input));
    }

    fn query(&self, input: QueryInput, done: Callback<ItemsOutput>) {
        done(self.do_query(input));
    }

    fn scan(&self, input: ScanInput, done: Callback<ItemsOutput>) {
        done(self.do_scan(input));
    }

    fn promise_api(&self) -> Option<Arc<dyn PromiseDynamoClient>> {
        if self.promise {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }
}

#[async_trait]
impl PromiseDynamoClient for SimDynamoClient {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, ClientError> {
        self.do_put(input)
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, ClientError> {
        self.do_get(input)
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, ClientError> {
        self.do_delete(input)
    }

    async fn query(&self, input: QueryInput) -> Result<ItemsOutput, ClientError> {
        self.do_query(input)
    }

    async fn scan(&self, input: ScanInput) -> Result<ItemsOutput, ClientError> {
        self.do_scan(input)
    }
}

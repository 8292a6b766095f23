//! `StoreService` - Wiring from configuration
//!
//! TigerStyle: One place decides which adapter owns which pattern.
//!
//! Builds a bus, registers the configured backend for every content type and
//! the search index for the search types. DynamoDB runs on simulated tables
//! or, with `dynamo_target = aws`, on the AWS SDK client; Riak runs on the
//! simulated client.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::bus::{Bus, Pattern};
use crate::config::{BackendKind, DynamoClientShape, DynamoTarget, StoreConfig};
use crate::constants::{CMD_INDEX, CMD_SET};
use crate::error::{StoreError, StoreResult};
use crate::store::dynamodb::{AwsClientOptions, AwsDynamoClient};
use crate::store::{
    register_catalog_store, register_entity_store, riak, search, DynamoStore, MemoryStore,
    MemoryTable, RiakStore, SearchIndexStore, SimDynamoClient, SimRiakClient,
};

/// A bus with the configured adapters registered.
#[derive(Debug)]
pub struct StoreService {
    bus: Bus,
    config: StoreConfig,
    search: Arc<SearchIndexStore>,
}

impl StoreService {
    /// Validate `config` and register every adapter it names.
    ///
    /// # Errors
    /// `Config` when the configuration is invalid.
    pub async fn start(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let bus = Bus::new();

        match config.backend {
            BackendKind::Memory => {
                let store = MemoryStore::new(MemoryTable::new());
                register_entity_store(&bus, Arc::new(store), &config.types).await;
            }
            BackendKind::Dynamodb => {
                let store = dynamo_store(&config).await?;
                register_catalog_store(&bus, Arc::new(store), &config.types, config.scan_limit_default)
                    .await;
            }
            BackendKind::Riak => {
                let store = RiakStore::new(Arc::new(SimRiakClient::new()))
                    .with_bucket_prefix(config.bucket_prefix.clone());
                riak::register(&bus, Arc::new(store), &config.types, config.scan_limit_default).await;
            }
        }

        let search = Arc::new(SearchIndexStore::new(&config.search_types));
        search::register(&bus, Arc::clone(&search)).await;

        tracing::info!(
            backend = ?config.backend,
            registrations = bus.registration_count().await,
            "store service started"
        );
        Ok(Self { bus, config, search })
    }

    /// The bus every operation goes through.
    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndexStore {
        &self.search
    }

    /// Store each payload through `set` and index its `title` and
    /// `description` when its type is searchable. Returns the stored count.
    ///
    /// # Errors
    /// The first payload without a string `type`, or the first failed command.
    pub async fn seed(&self, payloads: Vec<Value>) -> StoreResult<usize> {
        let mut count = 0;
        for payload in payloads {
            let entity_type = payload
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::invalid("seed records require a string type"))?
                .to_string();

            let stored = self
                .bus
                .command(&Pattern::store(CMD_SET).with_type(entity_type.clone()), payload)
                .await?;

            if self.config.search_types.contains(&entity_type) {
                let text = ["title", "description"]
                    .iter()
                    .filter_map(|field| stored.get(*field).and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.bus
                    .command(
                        &Pattern::store(CMD_INDEX).with_type(entity_type.clone()),
                        json!({ "id": stored["id"], "text": text }),
                    )
                    .await?;
            }
            count += 1;
        }
        tracing::info!(count, "seeded records");
        Ok(count)
    }

    /// [`StoreService::seed`] from a JSON file holding an array of payloads.
    ///
    /// # Errors
    /// `Config` when the file cannot be read or is not an array; seed errors.
    pub async fn seed_file(&self, path: &str) -> StoreResult<usize> {
        let expanded = shellexpand::tilde(path).to_string();
        let text = tokio::fs::read_to_string(&expanded)
            .await
            .map_err(|e| StoreError::Config(format!("reading {expanded}: {e}")))?;
        let payloads: Vec<Value> = serde_json::from_str(&text)
            .map_err(|e| StoreError::Config(format!("{expanded} must hold a JSON array: {e}")))?;
        self.seed(payloads).await
    }
}

/// Build the DynamoDB adapter over the configured target and client shape.
async fn dynamo_store(config: &StoreConfig) -> StoreResult<DynamoStore> {
    let callback_only = config.dynamo_client_shape == DynamoClientShape::Callback;

    match config.dynamo_target {
        DynamoTarget::Simulated => {
            let mut client = SimDynamoClient::new();
            if callback_only {
                client = client.callback_only();
            }
            let store = DynamoStore::new(Arc::new(client.clone()))
                .with_table_prefix(config.table_prefix.clone());
            for entity_type in &config.types {
                client.create_table(store.table_schema(entity_type));
            }
            Ok(store)
        }
        DynamoTarget::Aws => {
            let options = AwsClientOptions {
                region: config.dynamo_region.clone(),
                endpoint_url: config.dynamo_endpoint.clone(),
            };
            let mut client = AwsDynamoClient::connect(&options).await;
            if callback_only {
                client = client.callback_only();
            }
            let store = DynamoStore::new(Arc::new(client.clone()))
                .with_table_prefix(config.table_prefix.clone());
            if config.dynamo_create_tables {
                for entity_type in &config.types {
                    client
                        .ensure_table(&store.table_schema(entity_type))
                        .await
                        .map_err(|e| StoreError::backend("dynamodb", e.to_string()))?;
                }
            }
            Ok(store)
        }
    }
}

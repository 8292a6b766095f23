//! Oddstore - Multi-tenant content storage behind a command/query bus
//!
//! TigerStyle: one uniform async contract over interchangeable backends.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  Bus  {role:'store', cmd, type, store?}               │
//! ├───────────────────────────────────────────────────────┤
//! │  dispatch        │ get/set/remove/scan/batchGet       │
//! │  relationships   │ include → included                 │
//! │  fanout          │ isolated / all-or-nothing joins    │
//! ├───────────────────────────────────────────────────────┤
//! │  MemoryStore │ DynamoStore │ RiakStore │ SearchIndex  │
//! ├───────────────────────────────────────────────────────┤
//! │  Sim clients + FaultInjector                          │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Records are [`Entity`] values keyed by `(channel, type, id)`; channels
//! themselves are keyed by id alone. Callers never talk to an adapter
//! directly, only to the bus.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use oddstore::bus::{Bus, Pattern};
//! use oddstore::store::{register_catalog_store, DynamoStore, SimDynamoClient};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let client = SimDynamoClient::new();
//! let store = DynamoStore::new(Arc::new(client.clone()));
//! client.create_table(store.table_schema("video"));
//!
//! let bus = Bus::new();
//! register_catalog_store(&bus, Arc::new(store), &["video".to_string()], 10).await;
//!
//! let stored = bus
//!     .command(
//!         &Pattern::store("set").with_type("video"),
//!         json!({"channel": "oddnews", "title": "Launch"}),
//!     )
//!     .await?;
//! let fetched = bus
//!     .query(
//!         &Pattern::store("get").with_type("video"),
//!         json!({"id": stored["id"], "channel": "oddnews"}),
//!     )
//!     .await?;
//! assert_eq!(fetched["title"], "Launch");
//! # Ok::<(), oddstore::StoreError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod config;
pub mod constants;
pub mod entity;
pub mod error;
pub mod fault;
pub mod service;
pub mod store;

pub use bus::{Bus, Pattern};
pub use config::{BackendKind, DynamoClientShape, DynamoTarget, StoreConfig};
pub use entity::{Entity, EntityRef, Relationship, StoreKey};
pub use error::{StoreError, StoreResult};
pub use fault::{FaultConfig, FaultInjector, FaultType};
pub use service::StoreService;

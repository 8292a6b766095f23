//! Store - Backend adapters and their bus registration
//!
//! TigerStyle: One contract, several physical stores.
//!
//! ```text
//!             Bus {role:'store', cmd, type}
//!                          │
//!                      dispatch
//!            ┌─────────────┼──────────────┬──────────────┐
//!            ▼             ▼              ▼              ▼
//!       MemoryStore   DynamoStore     RiakStore   SearchIndexStore
//!       (get/set)     (full)          (full+query) (index/query)
//!                          │
//!             relationships / fanout
//! ```

pub mod args;
pub mod backend;
pub mod dispatch;
pub mod dynamodb;
pub mod fanout;
pub mod memory;
pub mod relationships;
pub mod riak;
pub mod search;

pub use args::{BatchGetArgs, GetArgs, KeyArgs, ScanArgs};
pub use backend::{CatalogStore, EntityLookup, EntityStore};
pub use dispatch::{register_catalog_store, register_entity_store};
pub use dynamodb::{AwsDynamoClient, DynamoClient, DynamoStore, SimDynamoClient};
pub use memory::{MemoryStore, MemoryTable};
pub use riak::{RiakClient, RiakStore, SimRiakClient};
pub use search::{SearchIndexStore, SearchQuery};

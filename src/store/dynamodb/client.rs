//! DynamoDB clients and shape binding
//!
//! Two client flavors exist in the wild: callback-style calls that report
//! through a completion function, and clients that also offer awaitable
//! variants. [`DynamoClient`] is the callback surface every client has;
//! [`DynamoClient::promise_api`] exposes the awaitable one when present.
//!
//! [`bind`] inspects the client once and returns an [`ItemOps`] bound to one
//! code path. Nothing above it knows which flavor is configured.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::types::{
    ClientError, DeleteItemInput, DeleteItemOutput, GetItemInput, GetItemOutput, ItemsOutput,
    PutItemInput, PutItemOutput, QueryInput, ScanInput,
};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Client Traits
// =============================================================================

/// Completion function of a callback-style call.
pub type Callback<T> = Box<dyn FnOnce(Result<T, ClientError>) + Send>;

/// Callback-style DynamoDB client.
pub trait DynamoClient: Send + Sync {
    /// `PutItem`
    fn put_item(&self, input: PutItemInput, done: Callback<PutItemOutput>);
    /// `GetItem`
    fn get_item(&self, input: GetItemInput, done: Callback<GetItemOutput>);
    /// `DeleteItem`
    fn delete_item(&self, input: DeleteItemInput, done: Callback<DeleteItemOutput>);
    /// `Query`
    fn query(&self, input: QueryInput, done: Callback<ItemsOutput>);
    /// `Scan`
    fn scan(&self, input: ScanInput, done: Callback<ItemsOutput>);

    /// The awaitable flavor of this client, if it has one.
    fn promise_api(&self) -> Option<Arc<dyn PromiseDynamoClient>> {
        None
    }
}

/// Awaitable DynamoDB client.
#[async_trait]
pub trait PromiseDynamoClient: Send + Sync {
    /// `PutItem`
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, ClientError>;
    /// `GetItem`
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, ClientError>;
    /// `DeleteItem`
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, ClientError>;
    /// `Query`
    async fn query(&self, input: QueryInput) -> Result<ItemsOutput, ClientError>;
    /// `Scan`
    async fn scan(&self, input: ScanInput) -> Result<ItemsOutput, ClientError>;
}

// =============================================================================
// Bound Operations
// =============================================================================

/// Which code path [`bind`] chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientShape {
    /// Native awaitable calls
    Promise,
    /// Callback calls bridged through a oneshot channel
    Callback,
}

/// A read of many items: partition query, or full-table scan.
#[derive(Debug, Clone)]
pub enum ScanOrQuery {
    /// `channel = :channel`
    Query(QueryInput),
    /// Whole table
    Scan(ScanInput),
}

/// Shape-agnostic item operations.
#[async_trait]
pub trait ItemOps: Send + Sync {
    /// The bound shape.
    fn shape(&self) -> ClientShape;
    /// Write one item.
    async fn put_item(&self, input: PutItemInput) -> StoreResult<PutItemOutput>;
    /// Read one item.
    async fn get_item(&self, input: GetItemInput) -> StoreResult<GetItemOutput>;
    /// Delete one item.
    async fn delete_item(&self, input: DeleteItemInput) -> StoreResult<DeleteItemOutput>;
    /// Query a partition or scan a table.
    async fn scan_or_query(&self, request: ScanOrQuery) -> StoreResult<ItemsOutput>;
}

/// Detect the client's shape and bind the matching operations.
#[must_use]
pub fn bind(client: Arc<dyn DynamoClient>) -> Arc<dyn ItemOps> {
    match client.promise_api() {
        Some(promise) => {
            tracing::debug!("dynamodb client bound to promise calls");
            Arc::new(PromiseOps { client: promise })
        }
        None => {
            tracing::debug!("dynamodb client bound to callback calls");
            Arc::new(CallbackOps { client })
        }
    }
}

fn backend_error(err: ClientError) -> StoreError {
    StoreError::backend("dynamodb", err.to_string())
}

struct PromiseOps {
    client: Arc<dyn PromiseDynamoClient>,
}

#[async_trait]
impl ItemOps for PromiseOps {
    fn shape(&self) -> ClientShape {
        ClientShape::Promise
    }

    async fn put_item(&self, input: PutItemInput) -> StoreResult<PutItemOutput> {
        self.client.put_item(input).await.map_err(backend_error)
    }

    async fn get_item(&self, input: GetItemInput) -> StoreResult<GetItemOutput> {
        self.client.get_item(input).await.map_err(backend_error)
    }

    async fn delete_item(&self, input: DeleteItemInput) -> StoreResult<DeleteItemOutput> {
        self.client.delete_item(input).await.map_err(backend_error)
    }

    async fn scan_or_query(&self, request: ScanOrQuery) -> StoreResult<ItemsOutput> {
        let result = match request {
            ScanOrQuery::Query(input) => self.client.query(input).await,
            ScanOrQuery::Scan(input) => self.client.scan(input).await,
        };
        result.map_err(backend_error)
    }
}

struct CallbackOps {
    client: Arc<dyn DynamoClient>,
}

/// Start a callback call and wait for its completion.
fn settle<T, F>(start: F) -> impl Future<Output = StoreResult<T>> + Send
where
    T: Send + 'static,
    F: FnOnce(Callback<T>),
{
    let (tx, rx) = oneshot::channel();
    start(Box::new(move |result| {
        // Receiver gone means the caller stopped waiting.
        let _ = tx.send(result);
    }));

    async move {
        rx.await
            .map_err(|_| StoreError::backend("dynamodb", "client dropped the callback"))?
            .map_err(backend_error)
    }
}

#[async_trait]
impl ItemOps for CallbackOps {
    fn shape(&self) -> ClientShape {
        ClientShape::Callback
    }

    async fn put_item(&self, input: PutItemInput) -> StoreResult<PutItemOutput> {
        settle(|done| self.client.put_item(input, done)).await
    }

    async fn get_item(&self, input: GetItemInput) -> StoreResult<GetItemOutput> {
        settle(|done| self.client.get_item(input, done)).await
    }

    async fn delete_item(&self, input: DeleteItemInput) -> StoreResult<DeleteItemOutput> {
        settle(|done| self.client.delete_item(input, done)).await
    }

    async fn scan_or_query(&self, request: ScanOrQuery) -> StoreResult<ItemsOutput> {
        match request {
            ScanOrQuery::Query(input) => settle(|done| self.client.query(input, done)).await,
            ScanOrQuery::Scan(input) => settle(|done| self.client.scan(input, done)).await,
        }
    }
}

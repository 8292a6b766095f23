//! Bus - In-process command/query dispatch
//!
//! TigerStyle: Pattern-matched handler registration, explicit routing errors.
//!
//! Stores never call each other directly. They register handlers here under
//! `{role:'store', cmd, type}` patterns and reach other stores through
//! [`Bus::query`]. Two tables exist: queries (request/response) and commands.
//! A command can also be sent fire-and-forget with [`Bus::send`].
//!
//! Routing picks the most specific matching registration. Among equally
//! specific registrations the most recent one wins.

mod pattern;

pub use pattern::Pattern;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Handlers
// =============================================================================

/// Future returned by a bus handler.
pub type HandlerFuture = BoxFuture<'static, StoreResult<Value>>;

/// A registered bus handler.
pub type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<Value>> + Send + 'static,
{
    Arc::new(move |args: Value| Box::pin(f(args)))
}

struct Registration {
    pattern: Pattern,
    handler: Handler,
}

#[derive(Default)]
struct HandlerTable {
    registrations: RwLock<Vec<Registration>>,
}

impl HandlerTable {
    async fn add(&self, pattern: Pattern, handler: Handler) {
        self.registrations
            .write()
            .await
            .push(Registration { pattern, handler });
    }

    async fn resolve(&self, request: &Pattern) -> Option<Handler> {
        let registrations = self.registrations.read().await;
        let best = registrations
            .iter()
            .enumerate()
            .filter(|(_, reg)| reg.pattern.matches(request))
            .max_by_key(|(index, reg)| (reg.pattern.specificity(), *index))
            .map(|(_, reg)| Arc::clone(&reg.handler));
        // Lock released before the handler runs; handlers may re-enter the bus.
        drop(registrations);
        best
    }

    async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }
}

// =============================================================================
// Bus
// =============================================================================

/// Command/query bus. Cheap to clone; clones share registrations.
#[derive(Clone, Default)]
pub struct Bus {
    queries: Arc<HandlerTable>,
    commands: Arc<HandlerTable>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").finish_non_exhaustive()
    }
}

impl Bus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query handler.
    pub async fn query_handler(&self, pattern: Pattern, handler: Handler) {
        tracing::debug!(%pattern, "registered query handler");
        self.queries.add(pattern, handler).await;
    }

    /// Register a command handler.
    pub async fn command_handler(&self, pattern: Pattern, handler: Handler) {
        tracing::debug!(%pattern, "registered command handler");
        self.commands.add(pattern, handler).await;
    }

    /// Dispatch a query and wait for its answer.
    ///
    /// # Errors
    /// `NoHandler` when nothing matches; otherwise whatever the handler returns.
    pub async fn query(&self, pattern: &Pattern, args: Value) -> StoreResult<Value> {
        let handler = self
            .queries
            .resolve(pattern)
            .await
            .ok_or_else(|| StoreError::no_handler(pattern.to_string()))?;
        handler(args).await
    }

    /// Dispatch a command and wait for its result.
    ///
    /// # Errors
    /// `NoHandler` when nothing matches; otherwise whatever the handler returns.
    pub async fn command(&self, pattern: &Pattern, payload: Value) -> StoreResult<Value> {
        let handler = self
            .commands
            .resolve(pattern)
            .await
            .ok_or_else(|| StoreError::no_handler(pattern.to_string()))?;
        handler(payload).await
    }

    /// Fire-and-forget command. Failures are logged, not returned.
    pub fn send(&self, pattern: Pattern, payload: Value) -> JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move {
            if let Err(e) = bus.command(&pattern, payload).await {
                tracing::warn!(%pattern, error = %e, "fire-and-forget command failed");
            }
        })
    }

    /// True if some query registration matches `pattern`.
    pub async fn has_query_handler(&self, pattern: &Pattern) -> bool {
        self.queries.resolve(pattern).await.is_some()
    }

    /// True if some command registration matches `pattern`.
    pub async fn has_command_handler(&self, pattern: &Pattern) -> bool {
        self.commands.resolve(pattern).await.is_some()
    }

    /// Total registrations across both tables.
    pub async fn registration_count(&self) -> usize {
        self.queries.len().await + self.commands.len().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn constant(value: Value) -> Handler {
        handler(move |_args| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    #[tokio::test]
    async fn test_most_specific_wins() {
        let bus = Bus::new();
        bus.query_handler(
            Pattern::store("batchGet").with_type("channel"),
            constant(json!("channel")),
        )
        .await;
        // Registered later, but less specific.
        bus.query_handler(Pattern::store("batchGet"), constant(json!("generic")))
            .await;

        let typed = Pattern::store("batchGet").with_type("channel");
        assert_eq!(bus.query(&typed, json!({})).await.unwrap(), json!("channel"));

        let generic = Pattern::store("batchGet");
        assert_eq!(bus.query(&generic, json!({})).await.unwrap(), json!("generic"));
    }

    #[tokio::test]
    async fn test_latest_registration_wins_tie() {
        let bus = Bus::new();
        bus.query_handler(Pattern::store("get").with_type("video"), constant(json!(1)))
            .await;
        bus.query_handler(Pattern::store("get").with_type("video"), constant(json!(2)))
            .await;

        let request = Pattern::store("get").with_type("video");
        assert_eq!(bus.query(&request, json!({})).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_no_handler() {
        let bus = Bus::new();
        let request = Pattern::store("get").with_type("unknown");
        let err = bus.query(&request, json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::NoHandler { .. }));

        // Query registrations do not answer commands.
        bus.query_handler(Pattern::store("get"), constant(json!(null))).await;
        let err = bus.command(&Pattern::store("get"), json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::NoHandler { .. }));
    }

    #[tokio::test]
    async fn test_send_runs_in_background() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.command_handler(
            Pattern::store("remove"),
            handler(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(true))
                }
            }),
        )
        .await;

        bus.send(Pattern::store("remove"), json!({})).await.unwrap();
        // Unrouted sends are logged and swallowed.
        bus.send(Pattern::store("missing"), json!({})).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_can_reenter_bus() {
        let bus = Bus::new();
        bus.query_handler(Pattern::store("inner"), constant(json!("inner")))
            .await;

        let inner_bus = bus.clone();
        bus.query_handler(
            Pattern::store("outer"),
            handler(move |_| {
                let bus = inner_bus.clone();
                async move { bus.query(&Pattern::store("inner"), json!({})).await }
            }),
        )
        .await;

        let result = bus.query(&Pattern::store("outer"), json!({})).await.unwrap();
        assert_eq!(result, json!("inner"));
        assert_eq!(bus.registration_count().await, 2);
    }
}

//! Typed subscription fan-out.
//!
//! A [`SubscriberSet`] holds the registered handlers for one event type and
//! delivers each event to every handler with bounded parallelism. Handlers
//! are isolated from one another: a failure, timeout, or panic in one never
//! cancels or blocks its siblings, and outcomes are logged rather than
//! surfaced to the caller. The handler list is snapshotted when a fan-out
//! starts, so registrations landing mid-flight only affect later events.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use log::{error, warn};
use tokio_util::sync::CancellationToken;

use shared::HandlerError;

/// Handlers of a single fan-out run at most this many at a time. Distinct
/// fan-out calls are independent; there is no global cap.
pub const MAX_HANDLER_CONCURRENCY: usize = 5;

/// A registered event handler.
#[async_trait]
pub trait Subscriber<E>: Send + Sync + 'static {
    /// Processes one event. The token is the handler's cancellation scope;
    /// long-running handlers should check it at suspension points.
    async fn handle(&self, event: &E, token: &CancellationToken) -> Result<(), HandlerError>;

    /// Name used in failure logs. Override the verbose default when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The registered handlers for one event type.
pub struct SubscriberSet<E> {
    handlers: RwLock<Vec<Arc<dyn Subscriber<E>>>>,
}

impl<E: Send + Sync + 'static> SubscriberSet<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler. Takes effect for fan-outs starting after this
    /// call; in-flight fan-outs keep their snapshot.
    pub fn subscribe(&self, handler: Arc<dyn Subscriber<E>>) {
        self.handlers
            .write()
            .expect("subscriber set poisoned")
            .push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().expect("subscriber set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every currently registered handler.
    ///
    /// `timeout` is each handler's individual time budget; `None` runs
    /// handlers unconstrained under the caller's token, which is how
    /// deferred long-running work is dispatched. No ordering is guaranteed
    /// beyond "all scheduled".
    pub async fn invoke(&self, event: &E, token: &CancellationToken, timeout: Option<Duration>) {
        let snapshot: Vec<Arc<dyn Subscriber<E>>> = self
            .handlers
            .read()
            .expect("subscriber set poisoned")
            .clone();

        stream::iter(snapshot)
            .for_each_concurrent(MAX_HANDLER_CONCURRENCY, |handler| async move {
                run_handler(handler, event, token, timeout).await;
            })
            .await;
    }
}

impl<E: Send + Sync + 'static> Default for SubscriberSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_handler<E: Send + Sync + 'static>(
    handler: Arc<dyn Subscriber<E>>,
    event: &E,
    token: &CancellationToken,
    timeout: Option<Duration>,
) {
    let result = match timeout {
        None => AssertUnwindSafe(handler.handle(event, token))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(HandlerError::failed("handler panicked"))),
        Some(limit) => {
            // Each handler gets its own scope derived from the caller's
            // token; exceeding the budget cancels this invocation only.
            let scope = token.child_token();
            let guarded = AssertUnwindSafe(handler.handle(event, &scope)).catch_unwind();
            tokio::select! {
                _ = token.cancelled() => {
                    scope.cancel();
                    Err(HandlerError::Cancelled)
                }
                outcome = tokio::time::timeout(limit, guarded) => match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(_panic)) => Err(HandlerError::failed("handler panicked")),
                    Err(_elapsed) => {
                        scope.cancel();
                        Err(HandlerError::Timeout { timeout: limit })
                    }
                },
            }
        }
    };

    match result {
        Ok(()) => {}
        Err(err) if err.is_cancellation() => {
            warn!("subscriber '{}' did not finish: {}", handler.name(), err);
        }
        Err(err) => {
            error!("subscriber '{}' failed: {}", handler.name(), err);
        }
    }
}

//! Per-request execution state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::ast::Document;
use crate::ast::Operation;
use crate::context::Context;
use crate::execution::strategy::ExecutionStrategy;
use crate::execution::strategy::ParallelStrategy;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::schema::Schema;

/// Before/after callbacks invoked around each discrete execution: once per
/// query or mutation, once per subscription event.
pub trait Instrumentation: Send + Sync {
    fn execution_start(&self, operation: &Operation) {
        let _ = operation;
    }

    fn execution_end(&self, response: &graphql::Response) {
        let _ = response;
    }
}

/// State shared across one whole execution (or one subscription event's
/// sub-execution).
///
/// Everything but the error collector is written once at setup. The error
/// collector accumulates concurrently from sibling resolutions; the
/// semaphore bounds concurrent resolver work for the context's lifetime.
pub(crate) struct ExecutionContext {
    pub(crate) schema: Arc<Schema>,
    pub(crate) document: Arc<Document>,
    pub(crate) operation: Arc<Operation>,
    pub(crate) variables: Object,
    pub(crate) root: Value,
    pub(crate) context: Context,
    pub(crate) cancellation: CancellationToken,
    pub(crate) nested_strategy: Arc<dyn ExecutionStrategy>,
    pub(crate) instrumentation: Arc<Vec<Arc<dyn Instrumentation>>>,
    errors: Mutex<Vec<graphql::Error>>,
    limiter: Arc<Semaphore>,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        schema: Arc<Schema>,
        document: Arc<Document>,
        operation: Arc<Operation>,
        variables: Object,
        root: Value,
        context: Context,
        cancellation: CancellationToken,
        instrumentation: Arc<Vec<Arc<dyn Instrumentation>>>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            schema,
            document,
            operation,
            variables,
            root,
            context,
            cancellation,
            // children of an object node resolve in parallel whatever the
            // root strategy is
            nested_strategy: Arc::new(ParallelStrategy),
            instrumentation,
            errors: Mutex::new(Vec::new()),
            limiter: Arc::new(Semaphore::new(concurrency_limit)),
        }
    }

    /// A fresh context for one subscription event's sub-execution: same
    /// request state, the event payload as the new root value, an empty
    /// error collector, and the same shared resolver limiter.
    pub(crate) fn for_event(&self, payload: Value) -> Self {
        Self {
            schema: self.schema.clone(),
            document: self.document.clone(),
            operation: self.operation.clone(),
            variables: self.variables.clone(),
            root: payload,
            context: self.context.clone(),
            cancellation: self.cancellation.clone(),
            nested_strategy: self.nested_strategy.clone(),
            instrumentation: self.instrumentation.clone(),
            errors: Mutex::new(Vec::new()),
            limiter: self.limiter.clone(),
        }
    }

    /// Append one error to the shared collector.
    pub(crate) fn record_error(&self, error: graphql::Error) {
        self.errors.lock().push(error);
    }

    /// Drain the collected errors.
    pub(crate) fn take_errors(&self) -> Vec<graphql::Error> {
        std::mem::take(&mut *self.errors.lock())
    }

    /// Acquire one slot of the bounded resolver pool. `None` only when the
    /// execution is being torn down.
    pub(crate) async fn acquire_resolver_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.limiter.clone().acquire_owned().await.ok()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

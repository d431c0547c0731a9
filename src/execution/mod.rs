//! Query execution.
//!
//! The [`Executor`] is the single entry point: given a validated
//! [`Request`], it selects the operation, coerces the variables, picks the
//! execution strategy for the operation kind and produces either one
//! [`Response`] (queries, mutations) or a [`SubscriptionStream`] of
//! discrete responses (subscriptions).

mod arguments;
mod collect;
mod context;
mod node;
mod resolve;
mod strategy;
mod subscription;

use std::sync::Arc;

pub use context::Instrumentation;
use context::ExecutionContext;
use strategy::ExecutionStrategy;
use strategy::ParallelStrategy;
use strategy::SerialStrategy;
pub use subscription::EventEmitter;
pub use subscription::EventSource;
pub use subscription::SubscriptionStream;
pub use subscription::event_source;

use crate::ast::Document;
use crate::ast::Operation;
use crate::ast::OperationKind;
use crate::error::ExecutionError;
use crate::execution::arguments::coerce_variable_values;
use crate::execution::collect::collect_fields;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::schema::InvalidValue;
use crate::schema::Schema;

/// What one execution call produced.
pub enum ExecutionOutcome {
    /// A single result tree: queries and mutations.
    Response(Response),

    /// A live sequence of result trees: subscriptions.
    Subscription(SubscriptionStream),
}

impl ExecutionOutcome {
    /// The single response, panicking on a subscription outcome.
    pub fn response(self) -> Response {
        match self {
            ExecutionOutcome::Response(response) => response,
            ExecutionOutcome::Subscription(_) => panic!("not a single response"),
        }
    }

    /// The subscription stream, panicking on a single-response outcome.
    pub fn subscription(self) -> SubscriptionStream {
        match self {
            ExecutionOutcome::Subscription(stream) => stream,
            ExecutionOutcome::Response(_) => panic!("not a subscription"),
        }
    }
}

/// The execution engine for one schema.
///
/// Strategy instances are constructed here and chosen per operation kind at
/// the entry point; nothing is process-wide.
pub struct Executor {
    schema: Arc<Schema>,
    instrumentation: Arc<Vec<Arc<dyn Instrumentation>>>,
    concurrency_limit: usize,
    event_queue_capacity: usize,
    serial: SerialStrategy,
    parallel: ParallelStrategy,
}

impl Executor {
    /// How many resolver calls may be in flight at once for one execution,
    /// unless configured otherwise. Bounds the fan-out of deeply nested or
    /// very wide selection sets.
    pub const DEFAULT_CONCURRENCY_LIMIT: usize = 64;

    /// How many delivered-but-unread subscription results may be pending
    /// per subscriber, unless configured otherwise.
    pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 32;
}

#[buildstructor::buildstructor]
impl Executor {
    /// Returns a builder that builds an [`Executor`].
    ///
    /// `schema` is required; `.instrumentation()` registers one hook at a
    /// time, `.concurrency_limit()` and `.event_queue_capacity()` override
    /// the defaults.
    #[builder(visibility = "pub")]
    fn new(
        schema: Arc<Schema>,
        instrumentations: Vec<Arc<dyn Instrumentation>>,
        concurrency_limit: Option<usize>,
        event_queue_capacity: Option<usize>,
    ) -> Self {
        Self {
            schema,
            instrumentation: Arc::new(instrumentations),
            concurrency_limit: concurrency_limit.unwrap_or(Self::DEFAULT_CONCURRENCY_LIMIT),
            event_queue_capacity: event_queue_capacity
                .unwrap_or(Self::DEFAULT_EVENT_QUEUE_CAPACITY),
            serial: SerialStrategy,
            parallel: ParallelStrategy,
        }
    }

    /// Execute one request.
    ///
    /// Failures to select the operation or to coerce the variables abort
    /// before any node resolution and come back as an error-only response;
    /// everything after that point follows partial-failure semantics.
    #[tracing::instrument(skip_all, level = "debug")]
    pub async fn execute(&self, request: Request) -> ExecutionOutcome {
        let operation = match select_operation(
            &request.document,
            request.operation_name.as_deref(),
        ) {
            Ok(operation) => Arc::new(operation.clone()),
            Err(error) => return ExecutionOutcome::Response(error.to_response()),
        };

        if request.cancellation.is_cancelled() {
            return ExecutionOutcome::Response(ExecutionError::Cancelled.to_response());
        }

        let variables =
            match coerce_variable_values(&self.schema, &operation, &request.variables) {
                Ok(variables) => variables,
                Err(errors) => {
                    return ExecutionOutcome::Response(Response::from_errors(errors));
                }
            };

        let kind = operation.kind;
        let ctx = ExecutionContext::new(
            self.schema.clone(),
            request.document.clone(),
            operation,
            variables,
            request.root,
            request.context,
            request.cancellation,
            self.instrumentation.clone(),
            self.concurrency_limit,
        );

        match kind {
            OperationKind::Query => {
                ExecutionOutcome::Response(self.execute_operation(ctx, &self.parallel).await)
            }
            OperationKind::Mutation => {
                ExecutionOutcome::Response(self.execute_operation(ctx, &self.serial).await)
            }
            OperationKind::Subscription => {
                match subscription::subscribe(ctx, self.event_queue_capacity).await {
                    Ok(stream) => ExecutionOutcome::Subscription(stream),
                    Err(response) => ExecutionOutcome::Response(response),
                }
            }
        }
    }

    /// Resolve a query or mutation root: collect the root grouped field
    /// set and run it through the root strategy.
    async fn execute_operation(
        &self,
        ctx: ExecutionContext,
        root_strategy: &dyn ExecutionStrategy,
    ) -> Response {
        let kind = ctx.operation.kind;
        let Some(root_type) = self
            .schema
            .root_operation_name(kind)
            .and_then(|name| self.schema.object_type(name))
        else {
            return ExecutionError::RootTypeUndefined { kind }.to_response();
        };

        for instrumentation in ctx.instrumentation.iter() {
            instrumentation.execution_start(&ctx.operation);
        }

        let grouped = collect_fields(
            &ctx.schema,
            &ctx.document,
            &ctx.variables,
            root_type,
            &[&ctx.operation.selection_set],
        );
        let root = ctx.root.clone();
        let path = Path::empty();
        let data = root_strategy
            .resolve_grouped(&ctx, root_type, grouped, &root, &path)
            .await;

        let response = if ctx.is_cancelled() {
            // partial data from a cancelled walk is discarded, not used
            let mut errors = ctx.take_errors();
            errors.push(ExecutionError::Cancelled.to_graphql_error(None));
            Response::from_errors(errors)
        } else {
            Response::builder()
                .data(match data {
                    Ok(value) => value,
                    // the error bubbled past the root: data is null
                    Err(InvalidValue) => Value::Null,
                })
                .errors(ctx.take_errors())
                .build()
        };

        for instrumentation in ctx.instrumentation.iter() {
            instrumentation.execution_end(&response);
        }
        response
    }
}

/// Select the operation to execute: by name, or the only one.
fn select_operation<'a>(
    document: &'a Document,
    name: Option<&str>,
) -> Result<&'a Operation, ExecutionError> {
    match name {
        Some(name) => document
            .operations
            .iter()
            .find(|operation| operation.name.as_deref() == Some(name))
            .ok_or_else(|| ExecutionError::UnknownOperation {
                name: name.to_string(),
            }),
        None => match document.operations.as_slice() {
            [] => Err(ExecutionError::NoOperation),
            [operation] => Ok(operation),
            _ => Err(ExecutionError::AmbiguousOperation),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Field;

    fn named_operation(name: &str) -> Operation {
        Operation::builder()
            .name(name)
            .selection(Field::builder().name("hero").build())
            .build()
    }

    #[test]
    fn operation_selection() {
        let document = Document::builder()
            .operation(named_operation("First"))
            .operation(named_operation("Second"))
            .build();

        assert_eq!(
            select_operation(&document, Some("Second")).unwrap().name,
            Some("Second".to_string()),
        );
        assert!(matches!(
            select_operation(&document, Some("Missing")),
            Err(ExecutionError::UnknownOperation { .. }),
        ));
        assert!(matches!(
            select_operation(&document, None),
            Err(ExecutionError::AmbiguousOperation),
        ));

        let single = Document::builder()
            .operation(named_operation("Only"))
            .build();
        assert!(select_operation(&single, None).is_ok());

        let empty = Document::builder().build();
        assert!(matches!(
            select_operation(&empty, None),
            Err(ExecutionError::NoOperation),
        ));
    }
}

//! The subscription pipeline.
//!
//! A subscribed field resolves to an [`EventSource`]: an explicit queue
//! with three operations (emit, error, complete) backed by a bounded
//! channel. Each raw payload the source emits becomes one fresh
//! sub-execution of the subscribed field, and the discrete results are
//! delivered to the subscriber strictly in the order the events arrived:
//! a single drain loop processes the queue head to tail and does not start
//! the next delivery before the previous one went out, however long each
//! sub-execution takes.
//!
//! An error while *obtaining* the source is a normal field-level error on
//! the outer response. An error from the source itself is a terminal
//! stream notification, not a discrete result; completion and cancellation
//! close the stream and release the upstream subscription.

use std::pin::Pin;
use std::task::Context as TaskContext;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::ast::OperationKind;
use crate::error::ExecutionError;
use crate::error::ResolverError;
use crate::execution::arguments::coerce_argument_values;
use crate::execution::collect::collect_fields;
use crate::execution::context::ExecutionContext;
use crate::execution::resolve::complete_value;
use crate::execution::resolve::fail_or_null;
use crate::execution::resolve::invoke_resolver;
use crate::execution::resolve::record_field_error;
use crate::graphql;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::resolver::ResolverContext;
use crate::schema::InvalidValue;
use crate::schema::TYPENAME;

/// One notification queued by an event source.
pub(crate) enum SourceEvent {
    Next(Value),
    Failed(ResolverError),
    Complete,
}

/// The emitting half of an event source, handed to user code.
///
/// Cloning is cheap; dropping every emitter completes the source.
#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::Sender<SourceEvent>,
}

impl EventEmitter {
    /// Queue one raw event payload. Returns `false` once the subscriber is
    /// gone and emitting has become pointless.
    pub async fn emit(&self, payload: impl Into<Value>) -> bool {
        self.sender
            .send(SourceEvent::Next(payload.into()))
            .await
            .is_ok()
    }

    /// Fail the source. This is terminal: it is delivered to the
    /// subscriber as a stream error, not as a discrete result.
    pub async fn error(&self, error: impl Into<ResolverError>) {
        let _ = self.sender.send(SourceEvent::Failed(error.into())).await;
    }

    /// Complete the source. Terminal as well.
    pub async fn complete(&self) {
        let _ = self.sender.send(SourceEvent::Complete).await;
    }
}

/// The receiving half of an event source; what a subscribe hook returns.
pub struct EventSource {
    receiver: mpsc::Receiver<SourceEvent>,
}

/// Create an event source with a bounded queue of `capacity` pending
/// events. Emitters are backpressured once the queue is full.
pub fn event_source(capacity: usize) -> (EventEmitter, EventSource) {
    let (sender, receiver) = mpsc::channel(capacity);
    (EventEmitter { sender }, EventSource { receiver })
}

/// The live sequence of discrete results for one subscriber.
///
/// Each item is one event's complete execution result; an `Err` item is
/// the terminal notification of an upstream source failure and the stream
/// ends right after it.
pub struct SubscriptionStream {
    field_name: String,
    receiver: ReceiverStream<Result<Response, ExecutionError>>,
}

impl SubscriptionStream {
    /// The response key of the subscribed root field the results belong to.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<Response, ExecutionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Set up one subscriber: obtain the event source from the subscribed
/// field and start the ordered drain loop.
pub(crate) async fn subscribe(
    ctx: ExecutionContext,
    delivery_capacity: usize,
) -> Result<SubscriptionStream, Response> {
    let Some(root_name) = ctx.schema.root_operation_name(OperationKind::Subscription) else {
        return Err(ExecutionError::RootTypeUndefined {
            kind: OperationKind::Subscription,
        }
        .to_response());
    };
    let Some(root_type) = ctx.schema.object_type(root_name) else {
        return Err(ExecutionError::RootTypeUndefined {
            kind: OperationKind::Subscription,
        }
        .to_response());
    };

    let grouped = collect_fields(
        &ctx.schema,
        &ctx.document,
        &ctx.variables,
        root_type,
        &[&ctx.operation.selection_set],
    );
    // Spec: https://spec.graphql.org/draft/#sec-Single-root-field
    if grouped.len() != 1 {
        return Err(ExecutionError::InvalidSubscriptionSelection.to_response());
    }
    let (response_key, fields) = grouped
        .into_iter()
        .next()
        .expect("the grouped field set has exactly one entry; qed");
    let field = *fields
        .first()
        .expect("a grouped field set entry is never empty; qed");
    if field.name == TYPENAME {
        return Err(ExecutionError::InvalidSubscriptionSelection.to_response());
    }
    let Some(definition) = root_type.field_definition(&field.name) else {
        return Err(ExecutionError::NotSubscribable {
            field: field.name.clone(),
        }
        .to_response());
    };
    let Some(subscribe_hook) = definition.subscribe_hook() else {
        return Err(ExecutionError::NotSubscribable {
            field: field.name.clone(),
        }
        .to_response());
    };

    let path = Path::empty().key(response_key);
    let arguments = match coerce_argument_values(&ctx.schema, definition, field, &ctx.variables) {
        Ok(arguments) => arguments,
        Err(message) => {
            // failing to obtain the event source is an ordinary field
            // error on the outer result, not a stream event
            let locations: Vec<graphql::Location> = field
                .position
                .map(|position| vec![position.into()])
                .unwrap_or_default();
            return Err(Response::from_errors(vec![
                graphql::Error::builder()
                    .message(message)
                    .path(path)
                    .locations(locations)
                    .build(),
            ]));
        }
    };

    let resolver_context = ResolverContext {
        parent: ctx.root.clone(),
        arguments,
        context: ctx.context.clone(),
        cancellation: ctx.cancellation.clone(),
        path: path.clone(),
        parent_type: root_type.name().to_string(),
        field_name: field.name.clone(),
        field_type: definition.field_type().clone(),
    };
    let source = tokio::select! {
        _ = ctx.cancellation.cancelled() => {
            return Err(ExecutionError::Cancelled.to_response());
        }
        source = subscribe_hook(resolver_context) => match source {
            Ok(source) => source,
            Err(error) => {
                return Err(Response::from_errors(vec![
                    error.to_graphql_error(path, field.position),
                ]));
            }
        },
    };

    let field_name = response_key.to_string();
    let (delivery, receiver) = mpsc::channel(delivery_capacity);
    tokio::spawn(drain(ctx, source, delivery, field_name.clone()));

    Ok(SubscriptionStream {
        field_name,
        receiver: ReceiverStream::new(receiver),
    })
}

/// The per-subscriber ordered delivery loop.
///
/// Events are processed head to tail; a later event's sub-execution only
/// starts once the previous result has been handed to the subscriber, so a
/// fast event can never overtake a slow earlier one.
async fn drain(
    ctx: ExecutionContext,
    mut source: EventSource,
    delivery: mpsc::Sender<Result<Response, ExecutionError>>,
    field_name: String,
) {
    loop {
        let event = tokio::select! {
            _ = ctx.cancellation.cancelled() => break,
            event = source.receiver.recv() => event,
        };
        match event {
            Some(SourceEvent::Next(payload)) => {
                let event_ctx = ctx.for_event(payload);
                let response = execute_event(&event_ctx).await;
                if ctx.is_cancelled() {
                    // the result of a cancelled sub-execution is discarded
                    break;
                }
                let delivered = tokio::select! {
                    _ = ctx.cancellation.cancelled() => false,
                    sent = delivery.send(Ok(response)) => sent.is_ok(),
                };
                if !delivered {
                    break;
                }
            }
            Some(SourceEvent::Failed(error)) => {
                let notification = ExecutionError::EventSourceFailed {
                    field: field_name,
                    reason: error.message,
                };
                tokio::select! {
                    _ = ctx.cancellation.cancelled() => {}
                    _ = delivery.send(Err(notification)) => {}
                }
                break;
            }
            Some(SourceEvent::Complete) | None => break,
        }
    }
    // dropping the source here unsubscribes upstream
}

/// Run one event's complete sub-execution: a fresh node tree rooted at the
/// subscribed field, with the raw payload as the new source value.
async fn execute_event(ctx: &ExecutionContext) -> Response {
    for instrumentation in ctx.instrumentation.iter() {
        instrumentation.execution_start(&ctx.operation);
    }
    let response = execute_event_tree(ctx).await;
    for instrumentation in ctx.instrumentation.iter() {
        instrumentation.execution_end(&response);
    }
    response
}

async fn execute_event_tree(ctx: &ExecutionContext) -> Response {
    // these lookups were validated at subscribe time
    let root_type = ctx
        .schema
        .root_operation_name(OperationKind::Subscription)
        .and_then(|name| ctx.schema.object_type(name))
        .expect("the subscription root type was checked at subscribe time; qed");
    let grouped = collect_fields(
        &ctx.schema,
        &ctx.document,
        &ctx.variables,
        root_type,
        &[&ctx.operation.selection_set],
    );
    let (response_key, fields) = grouped
        .into_iter()
        .next()
        .expect("the grouped field set has exactly one entry; qed");
    let field = *fields
        .first()
        .expect("a grouped field set entry is never empty; qed");
    let definition = root_type
        .field_definition(&field.name)
        .expect("the subscribed field was checked at subscribe time; qed");
    let path = Path::empty().key(response_key);
    let non_null = definition.field_type().is_non_null();

    let node = match coerce_argument_values(&ctx.schema, definition, field, &ctx.variables) {
        Err(message) => {
            record_field_error(ctx, message, &path, field.position);
            fail_or_null(non_null)
        }
        Ok(arguments) => {
            let resolved = if definition.registered_resolver().is_some() {
                invoke_resolver(
                    ctx,
                    root_type,
                    definition,
                    field,
                    &ctx.root,
                    arguments,
                    path.clone(),
                )
                .await
            } else {
                // without a resolver the raw payload already is the
                // field's value
                Ok(ctx.root.clone())
            };
            match resolved {
                Ok(_) if ctx.is_cancelled() => Err(InvalidValue),
                Ok(value) => {
                    complete_value(
                        ctx,
                        root_type,
                        &fields,
                        definition.field_type(),
                        value,
                        path.clone(),
                    )
                    .await
                }
                Err(error) => {
                    ctx.record_error(error.to_graphql_error(path.clone(), field.position));
                    fail_or_null(non_null)
                }
            }
        }
    };

    let data = match node {
        Ok(value) => {
            let mut object = Object::default();
            object.insert(response_key, value);
            Value::Object(object)
        }
        Err(InvalidValue) => Value::Null,
    };
    Response::builder()
        .data(data)
        .errors(ctx.take_errors())
        .build()
}

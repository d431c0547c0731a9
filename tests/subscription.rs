//! Subscription pipeline tests: ordering, terminal notifications, teardown.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::StreamExt;
use graphql_engine::ExecutionError;
use graphql_engine::Executor;
use graphql_engine::Request;
use graphql_engine::ResolverError;
use graphql_engine::Response;
use graphql_engine::ast::Document;
use graphql_engine::ast::Field;
use graphql_engine::ast::Operation;
use graphql_engine::ast::OperationKind;
use graphql_engine::event_source;
use graphql_engine::json_ext::Path;
use graphql_engine::json_ext::Value;
use graphql_engine::schema::FieldDefinition;
use graphql_engine::schema::FieldType;
use graphql_engine::schema::ObjectType;
use graphql_engine::schema::Schema;
use serde_json_bytes::json;
use tokio_util::sync::CancellationToken;

fn subscription_document(field: Field) -> Document {
    Document::builder()
        .operation(
            Operation::builder()
                .kind(OperationKind::Subscription)
                .selection(field)
                .build(),
        )
        .build()
}

fn counter_schema(counter_field: FieldDefinition) -> Schema {
    Schema::builder()
        .query("Query")
        .subscription("Subscription")
        .object(ObjectType::new("Query"))
        .object(ObjectType::new("Subscription").field(counter_field))
        .build()
}

async fn subscribe(
    schema: Schema,
    document: Document,
    cancellation: CancellationToken,
) -> Result<graphql_engine::SubscriptionStream, Response> {
    let executor = Executor::builder().schema(Arc::new(schema)).build();
    match executor
        .execute(
            Request::builder()
                .document(Arc::new(document))
                .cancellation(cancellation)
                .build(),
        )
        .await
    {
        graphql_engine::ExecutionOutcome::Subscription(stream) => Ok(stream),
        graphql_engine::ExecutionOutcome::Response(response) => Err(response),
    }
}

#[test_log::test(tokio::test)]
async fn events_are_delivered_in_emission_order_despite_resolution_delays() {
    // per-event resolution delays of 30ms, 5ms and 10ms must not let a
    // faster later event overtake an earlier one
    let field = FieldDefinition::new("counter", FieldType::Int)
        .resolve_async(|ctx| async move {
            let delay = match ctx.parent.as_i64() {
                Some(1) => 30,
                Some(2) => 5,
                _ => 10,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ctx.parent.clone())
        })
        .subscribe_with(|_| {
            let (emitter, source) = event_source(8);
            tokio::spawn(async move {
                for i in 1..=3 {
                    emitter.emit(json!(i)).await;
                }
                emitter.complete().await;
            });
            Ok(source)
        });

    let document = subscription_document(Field::builder().name("counter").build());
    let stream = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect("subscribing succeeds");
    assert_eq!(stream.field_name(), "counter");

    let responses: Vec<_> = stream.collect().await;
    let observed: Vec<Value> = responses
        .into_iter()
        .map(|item| {
            let response = item.expect("no terminal error");
            assert!(response.errors.is_empty());
            response
                .data
                .as_ref()
                .and_then(Value::as_object)
                .and_then(|data| data.get("counter"))
                .cloned()
                .unwrap()
        })
        .collect();
    assert_eq!(observed, vec![json!(1), json!(2), json!(3)]);
}

#[test_log::test(tokio::test)]
async fn the_event_payload_is_the_field_value_without_a_resolver() {
    let field = FieldDefinition::new("counter", FieldType::Int).subscribe_with(|_| {
        let (emitter, source) = event_source(8);
        tokio::spawn(async move {
            emitter.emit(json!(41)).await;
            emitter.emit(json!(42)).await;
            emitter.complete().await;
        });
        Ok(source)
    });

    let document = subscription_document(Field::builder().name("counter").build());
    let mut stream = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect("subscribing succeeds");

    assert_eq!(
        stream.next().await.unwrap().unwrap().data,
        Some(json!({ "counter": 41 })),
    );
    assert_eq!(
        stream.next().await.unwrap().unwrap().data,
        Some(json!({ "counter": 42 })),
    );
    assert!(stream.next().await.is_none());
}

#[test_log::test(tokio::test)]
async fn per_event_errors_are_embedded_not_terminal() {
    let field = FieldDefinition::new("counter", FieldType::Int)
        .resolve(|ctx| {
            if ctx.parent.as_i64() == Some(2) {
                Err(ResolverError::new("two is broken"))
            } else {
                Ok(ctx.parent.clone())
            }
        })
        .subscribe_with(|_| {
            let (emitter, source) = event_source(8);
            tokio::spawn(async move {
                for i in 1..=3 {
                    emitter.emit(json!(i)).await;
                }
                emitter.complete().await;
            });
            Ok(source)
        });

    let document = subscription_document(Field::builder().name("counter").build());
    let stream = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect("subscribing succeeds");
    let responses: Vec<Response> = stream.map(|item| item.unwrap()).collect().await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].data, Some(json!({ "counter": 1 })));
    // the failed event carries its own error and does not end the stream
    assert_eq!(responses[1].data, Some(json!({ "counter": null })));
    assert_eq!(responses[1].errors.len(), 1);
    assert_eq!(responses[1].errors[0].message, "two is broken");
    assert_eq!(responses[1].errors[0].path, Some(Path::from("counter")));
    assert_eq!(responses[2].data, Some(json!({ "counter": 3 })));
}

#[test_log::test(tokio::test)]
async fn an_upstream_error_is_a_terminal_notification() {
    let field = FieldDefinition::new("counter", FieldType::Int).subscribe_with(|_| {
        let (emitter, source) = event_source(8);
        tokio::spawn(async move {
            emitter.emit(json!(1)).await;
            emitter.error("the upstream went away").await;
        });
        Ok(source)
    });

    let document = subscription_document(Field::builder().name("counter").build());
    let mut stream = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect("subscribing succeeds");

    assert!(stream.next().await.unwrap().is_ok());
    let terminal = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(
        terminal,
        ExecutionError::EventSourceFailed { ref field, ref reason }
            if field == "counter" && reason == "the upstream went away",
    ));
    // the terminal notification ends the stream
    assert!(stream.next().await.is_none());
}

#[test_log::test(tokio::test)]
async fn failing_to_obtain_the_event_source_is_a_field_error() {
    let field = FieldDefinition::new("counter", FieldType::Int)
        .subscribe_with(|_| Err(ResolverError::new("no event bus available")));

    let document = subscription_document(Field::builder().name("counter").build());
    let response = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect_err("subscribing fails");

    assert_eq!(response.data, None);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "no event bus available");
    assert_eq!(response.errors[0].path, Some(Path::from("counter")));
}

#[test_log::test(tokio::test)]
async fn a_field_without_an_event_source_is_rejected() {
    let field = FieldDefinition::new("counter", FieldType::Int).resolve(|_| Ok(json!(0)));

    let document = subscription_document(Field::builder().name("counter").build());
    let response = subscribe(counter_schema(field), document, CancellationToken::new())
        .await
        .expect_err("subscribing fails");

    assert_eq!(
        response.errors[0].extension_code().as_deref(),
        Some("NOT_SUBSCRIBABLE"),
    );
}

#[test_log::test(tokio::test)]
async fn subscriptions_select_exactly_one_root_field() {
    let field = FieldDefinition::new("counter", FieldType::Int).subscribe_with(|_| {
        let (_, source) = event_source(1);
        Ok(source)
    });
    let schema = Schema::builder()
        .query("Query")
        .subscription("Subscription")
        .object(ObjectType::new("Query"))
        .object(
            ObjectType::new("Subscription")
                .field(field)
                .field(FieldDefinition::new("other", FieldType::Int)),
        )
        .build();

    let document = Document::builder()
        .operation(
            Operation::builder()
                .kind(OperationKind::Subscription)
                .selection(Field::builder().name("counter").build())
                .selection(Field::builder().name("other").build())
                .build(),
        )
        .build();

    let response = subscribe(schema, document, CancellationToken::new())
        .await
        .expect_err("subscribing fails");
    assert_eq!(
        response.errors[0].extension_code().as_deref(),
        Some("INVALID_SUBSCRIPTION_SELECTION"),
    );
}

#[test_log::test(tokio::test)]
async fn cancellation_tears_down_one_subscriber() {
    let (emitter, source) = event_source(8);
    let source = Arc::new(parking_lot::Mutex::new(Some(source)));
    let field = FieldDefinition::new("counter", FieldType::Int).subscribe_with(move |_| {
        source
            .lock()
            .take()
            .map(Ok)
            .unwrap_or_else(|| Err(ResolverError::new("already subscribed")))
    });

    let cancellation = CancellationToken::new();
    let document = subscription_document(Field::builder().name("counter").build());
    let mut stream = subscribe(counter_schema(field), document, cancellation.clone())
        .await
        .expect("subscribing succeeds");

    assert!(emitter.emit(json!(1)).await);
    assert!(stream.next().await.unwrap().is_ok());

    cancellation.cancel();

    // the pipeline stops delivering and releases the upstream subscription
    assert!(stream.next().await.is_none());
    let mut upstream_gone = false;
    for _ in 0..50 {
        if !emitter.emit(json!(0)).await {
            upstream_gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(upstream_gone, "cancelling must unsubscribe upstream");
}

#[test_log::test(tokio::test)]
async fn instrumentation_runs_once_per_event() {
    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }
    impl graphql_engine::Instrumentation for Counting {
        fn execution_start(&self, _operation: &Operation) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn execution_end(&self, _response: &Response) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counting = Arc::new(Counting::default());
    let field = FieldDefinition::new("counter", FieldType::Int).subscribe_with(|_| {
        let (emitter, source) = event_source(8);
        tokio::spawn(async move {
            for i in 1..=3 {
                emitter.emit(json!(i)).await;
            }
            emitter.complete().await;
        });
        Ok(source)
    });

    let executor = Executor::builder()
        .schema(Arc::new(counter_schema(field)))
        .instrumentation(counting.clone() as Arc<dyn graphql_engine::Instrumentation>)
        .build();
    let document = subscription_document(Field::builder().name("counter").build());
    let stream = executor
        .execute(Request::builder().document(Arc::new(document)).build())
        .await
        .subscription();

    let delivered = stream.collect::<Vec<_>>().await.len();
    assert_eq!(delivered, 3);
    assert_eq!(counting.starts.load(Ordering::SeqCst), 3);
    assert_eq!(counting.ends.load(Ordering::SeqCst), 3);
}

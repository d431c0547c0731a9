//! Shared node resolution.
//!
//! One field node goes through the same steps whatever the strategy:
//! coerce its arguments, invoke its resolver, then complete the resolver's
//! value against the declared output type, recursing into the nested
//! parallel strategy for composite values.

use futures::future::BoxFuture;
use futures::future::join_all;

use crate::ast;
use crate::error::ResolverError;
use crate::execution::arguments::coerce_argument_values;
use crate::execution::collect::collect_fields;
use crate::execution::context::ExecutionContext;
use crate::execution::node::NodeResult;
use crate::execution::node::assemble_list;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::json_ext::Value;
use crate::resolver::ResolverContext;
use crate::resolver::ResolverOutput;
use crate::schema::FieldDefinition;
use crate::schema::FieldType;
use crate::schema::InvalidValue;
use crate::schema::ObjectType;
use crate::schema::TYPENAME;

/// Resolve one grouped-field-set entry: the node at `path`, plus its whole
/// subtree.
///
/// Field-level failures are recorded on the context and absorbed here when
/// the declared type is nullable; `Err` escapes only for a failed non-null
/// position, to be interpreted by the parent's assembly step.
pub(crate) fn execute_field<'a>(
    ctx: &'a ExecutionContext,
    parent_type: &'a ObjectType,
    source: &'a Value,
    fields: Vec<&'a ast::Field>,
    path: Path,
) -> BoxFuture<'a, NodeResult> {
    Box::pin(async move {
        // The RECURSION_LIMIT is chosen to be:
        //   < # expected to cause stack overflow &&
        //   > # expected in a legitimate query
        const RECURSION_LIMIT: usize = 512;

        let field = *fields
            .first()
            .expect("a grouped field set entry is never empty; qed");

        if ctx.is_cancelled() {
            return Err(InvalidValue);
        }
        if path.len() > RECURSION_LIMIT {
            tracing::error!("field resolution recursion limit({RECURSION_LIMIT}) exceeded");
            record_field_error(
                ctx,
                format!("Recursion limit exceeded resolving field {}", field.name),
                &path,
                field.position,
            );
            return Err(InvalidValue);
        }

        // the engine answers __typename itself, no resolver involved
        if field.name == TYPENAME {
            return Ok(Value::String(parent_type.name().into()));
        }

        let Some(definition) = parent_type.field_definition(&field.name) else {
            // validation checks field existence; an unknown field resolves
            // to nothing rather than failing the request
            failfast_debug!(
                "field '{}' is absent from type '{}'",
                field.name,
                parent_type.name()
            );
            return Ok(Value::Null);
        };
        let ty = definition.field_type();
        let non_null = ty.is_non_null();

        let arguments =
            match coerce_argument_values(&ctx.schema, definition, field, &ctx.variables) {
                Ok(arguments) => arguments,
                Err(message) => {
                    record_field_error(ctx, message, &path, field.position);
                    return fail_or_null(non_null);
                }
            };

        let resolved = invoke_resolver(
            ctx,
            parent_type,
            definition,
            field,
            source,
            arguments,
            path.clone(),
        )
        .await;
        if ctx.is_cancelled() {
            // a late resolver result is discarded, never used
            return Err(InvalidValue);
        }
        let value = match resolved {
            Ok(value) => value,
            Err(error) => {
                ctx.record_error(error.to_graphql_error(path.clone(), field.position));
                return fail_or_null(non_null);
            }
        };

        complete_value(ctx, parent_type, &fields, ty, value, path).await
    })
}

/// Invoke the field's resolver: the registered one from the schema's
/// resolver table, or the default property lookup on the parent value.
///
/// Deferred resolver work runs on the worker pool, bounded by the
/// context's resolver limiter; a cancelled execution stops waiting and the
/// task's eventual result is discarded.
pub(crate) async fn invoke_resolver(
    ctx: &ExecutionContext,
    parent_type: &ObjectType,
    definition: &FieldDefinition,
    field: &ast::Field,
    source: &Value,
    arguments: Object,
    path: Path,
) -> Result<Value, ResolverError> {
    let Some(resolver) = definition.registered_resolver() else {
        return Ok(default_resolve(source, &field.name));
    };

    let resolver_context = ResolverContext {
        parent: source.clone(),
        arguments,
        context: ctx.context.clone(),
        cancellation: ctx.cancellation.clone(),
        path,
        parent_type: parent_type.name().to_string(),
        field_name: field.name.clone(),
        field_type: definition.field_type().clone(),
    };

    match resolver.resolve(resolver_context) {
        ResolverOutput::Ready(result) => result,
        ResolverOutput::Deferred(future) => {
            let Some(permit) = ctx.acquire_resolver_slot().await else {
                return Err(ResolverError::new("execution cancelled"));
            };
            let handle = tokio::spawn(async move {
                let _permit = permit;
                future.await
            });
            tokio::select! {
                _ = ctx.cancellation.cancelled() => Err(ResolverError::new("execution cancelled")),
                joined = handle => match joined {
                    Ok(result) => result,
                    Err(join_error) => {
                        Err(ResolverError::new(format!("resolver task failed: {join_error}")))
                    }
                },
            }
        }
    }
}

/// A failed field becomes null in place when nullable, or the propagated
/// marker when its declared type forbids null.
pub(crate) fn fail_or_null(non_null: bool) -> NodeResult {
    if non_null {
        Err(InvalidValue)
    } else {
        Ok(Value::Null)
    }
}

/// The default resolver: a property lookup on the parent object value.
fn default_resolve(source: &Value, field_name: &str) -> Value {
    source
        .as_object()
        .and_then(|object| object.get(field_name))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Complete a resolved value against the declared output type.
///
/// For every nullable position, a failure below is absorbed by replacing
/// the value with null and returning `Ok`; for non-null positions the
/// marker keeps propagating until the next nullable ancestor.
pub(crate) fn complete_value<'a>(
    ctx: &'a ExecutionContext,
    parent_type: &'a ObjectType,
    fields: &'a [&'a ast::Field],
    ty: &'a FieldType,
    value: Value,
    path: Path,
) -> BoxFuture<'a, NodeResult> {
    Box::pin(async move {
        let field = *fields
            .first()
            .expect("a grouped field set entry is never empty; qed");
        let (content_type, non_null) = match ty {
            FieldType::NonNull(inner) => (inner.as_ref(), true),
            ty => (ty, false),
        };

        if value.is_null() {
            if non_null {
                record_null_error(ctx, parent_type, content_type, &path, field.position);
                return Err(InvalidValue);
            }
            return Ok(Value::Null);
        }

        let completed: NodeResult = match content_type {
            FieldType::List(inner) => match value {
                Value::Array(items) => {
                    // array items are their own subtrees and resolve
                    // concurrently, the index keeps the output in order
                    let items = items.into_iter().enumerate().map(|(index, item)| {
                        complete_value(ctx, parent_type, fields, inner, item, path.index(index))
                    });
                    assemble_list(join_all(items).await)
                }
                _ => {
                    record_field_error(
                        ctx,
                        format!(
                            "Expected a list value for field {}.{}",
                            parent_type.name(),
                            field.name,
                        ),
                        &path,
                        field.position,
                    );
                    Err(InvalidValue)
                }
            },
            FieldType::Named(name)
                if ctx.schema.scalar(name).is_none()
                    && ctx.schema.enum_values(name).is_none() =>
            {
                // composite: object, interface or union
                match ctx.schema.resolve_runtime_type(name, &value) {
                    None => {
                        record_field_error(
                            ctx,
                            format!(
                                "Could not resolve the concrete type of value for field {}.{}",
                                parent_type.name(),
                                field.name,
                            ),
                            &path,
                            field.position,
                        );
                        Err(InvalidValue)
                    }
                    Some(runtime_type) => {
                        let selection_sets: Vec<&ast::SelectionSet> =
                            fields.iter().map(|field| &field.selection_set).collect();
                        let grouped = collect_fields(
                            &ctx.schema,
                            &ctx.document,
                            &ctx.variables,
                            runtime_type,
                            &selection_sets,
                        );
                        ctx.nested_strategy
                            .resolve_grouped(ctx, runtime_type, grouped, &value, &path)
                            .await
                    }
                }
            }
            leaf => serialize_leaf(ctx, parent_type, field, leaf, &value, &path),
        };

        match completed {
            Ok(completed) => Ok(completed),
            Err(InvalidValue) if non_null => Err(InvalidValue),
            Err(InvalidValue) => Ok(Value::Null),
        }
    })
}

/// Serialize a leaf value through the scalar's output coercion, or check a
/// builtin scalar / enum value. Failures are field errors and null the node
/// per the non-null rule.
fn serialize_leaf(
    ctx: &ExecutionContext,
    parent_type: &ObjectType,
    field: &ast::Field,
    ty: &FieldType,
    value: &Value,
    path: &Path,
) -> NodeResult {
    let valid = match ty {
        FieldType::Int => value
            .as_i64()
            .and_then(|x| i32::try_from(x).ok())
            .is_some(),
        FieldType::Float => value.as_f64().is_some(),
        FieldType::Boolean => value.as_bool().is_some(),
        FieldType::String => value.is_string(),
        FieldType::Id => value.is_string() || value.is_i64() || value.is_u64(),
        FieldType::Named(name) => {
            if let Some(scalar) = ctx.schema.scalar(name) {
                return match scalar.serialize(value) {
                    Ok(serialized) => Ok(serialized),
                    Err(InvalidValue) => {
                        record_field_error(
                            ctx,
                            format!(
                                "Invalid {ty} value for field {}.{}",
                                parent_type.name(),
                                field.name,
                            ),
                            path,
                            field.position,
                        );
                        Err(InvalidValue)
                    }
                };
            }
            ctx.schema
                .enum_values(name)
                .zip(value.as_str())
                .map(|(values, value)| values.contains(value))
                .unwrap_or_default()
        }
        // wrappers are unwrapped by the caller
        FieldType::List(_) | FieldType::NonNull(_) => false,
    };

    if valid {
        Ok(value.clone())
    } else {
        record_field_error(
            ctx,
            format!(
                "Invalid {ty} value for field {}.{}",
                parent_type.name(),
                field.name,
            ),
            path,
            field.position,
        );
        Err(InvalidValue)
    }
}

pub(crate) fn record_field_error(
    ctx: &ExecutionContext,
    message: String,
    path: &Path,
    position: Option<ast::Position>,
) {
    let locations: Vec<graphql::Location> =
        position.map(|position| vec![position.into()]).unwrap_or_default();
    ctx.record_error(
        graphql::Error::builder()
            .message(message)
            .path(path.clone())
            .locations(locations)
            .build(),
    );
}

fn record_null_error(
    ctx: &ExecutionContext,
    parent_type: &ObjectType,
    content_type: &FieldType,
    path: &Path,
    position: Option<ast::Position>,
) {
    let message = match path.last() {
        Some(PathElement::Index(index)) => format!(
            "Cannot return null for non-nullable array element of type {content_type} at index {index}",
        ),
        Some(PathElement::Key(key)) => format!(
            "Cannot return null for non-nullable field {}.{key}",
            parent_type.name(),
        ),
        None => format!("Cannot return null for non-nullable field of type {content_type}!"),
    };
    record_field_error(ctx, message, path, position);
}

//! Execution strategies.
//!
//! A strategy decides scheduling for one level of the output tree. The two
//! value-producing variants are here; the subscription pipeline, which
//! turns a root field into a stream of discrete executions, lives in
//! [`super::subscription`].
//!
//! Strategy instances are constructed and injected per operation kind at
//! the entry point; there is no process-wide strategy state.

use futures::future::BoxFuture;
use futures::future::join_all;
use serde_json_bytes::ByteString;

use crate::execution::collect::GroupedFieldSet;
use crate::execution::context::ExecutionContext;
use crate::execution::node::NodeResult;
use crate::execution::node::assemble_object;
use crate::execution::resolve::execute_field;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::schema::ObjectType;

/// Resolves one grouped field set into an object node.
pub(crate) trait ExecutionStrategy: Send + Sync {
    fn resolve_grouped<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        object_type: &'a ObjectType,
        grouped: GroupedFieldSet<'a>,
        source: &'a Value,
        path: &'a Path,
    ) -> BoxFuture<'a, NodeResult>;
}

/// One field at a time, in document order, each subtree fully resolved
/// (nested asynchronous work included) before the next one starts.
///
/// Used for the mutation root only, where side-effect ordering is
/// mandated; everything below a root field still resolves with
/// [`ParallelStrategy`].
pub(crate) struct SerialStrategy;

impl ExecutionStrategy for SerialStrategy {
    fn resolve_grouped<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        object_type: &'a ObjectType,
        grouped: GroupedFieldSet<'a>,
        source: &'a Value,
        path: &'a Path,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let mut entries = Vec::with_capacity(grouped.len());
            for (response_key, fields) in grouped {
                let node =
                    execute_field(ctx, object_type, source, fields, path.key(response_key)).await;
                entries.push((ByteString::from(response_key), node));
            }
            assemble_object(entries)
        })
    }
}

/// All sibling fields start concurrently and are joined before the parent
/// is considered resolved. An error in one sibling neither cancels nor
/// blocks the others, and the assembled object preserves the grouped field
/// set's document order whatever the completion order was.
pub(crate) struct ParallelStrategy;

impl ExecutionStrategy for ParallelStrategy {
    fn resolve_grouped<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        object_type: &'a ObjectType,
        grouped: GroupedFieldSet<'a>,
        source: &'a Value,
        path: &'a Path,
    ) -> BoxFuture<'a, NodeResult> {
        Box::pin(async move {
            let siblings = grouped.into_iter().map(|(response_key, fields)| async move {
                let node =
                    execute_field(ctx, object_type, source, fields, path.key(response_key)).await;
                (ByteString::from(response_key), node)
            });
            assemble_object(join_all(siblings).await)
        })
    }
}

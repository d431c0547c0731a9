//! The resolver contract.
//!
//! A resolver computes one field's value from its parent value and coerced
//! arguments. It can answer synchronously ([`ResolverOutput::Ready`]) or
//! hand back a future ([`ResolverOutput::Deferred`]) that the engine awaits
//! on the worker pool — batched data sources fit the deferred shape too.
//!
//! Resolvers are registered on field definitions during schema construction,
//! building an explicit field-identity → resolver table; there is no runtime
//! reflection over the parent value beyond the default property lookup used
//! for fields with no registered resolver.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::Future;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::ResolverError;
use crate::execution::EventSource;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::schema::FieldType;

/// Everything a resolver gets to see for one field resolution.
///
/// The values are owned so that an asynchronous resolver can move them into
/// its future without borrowing from the engine's walk.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ResolverContext {
    /// The parent (source) value the field is resolved against.
    pub parent: Value,

    /// The coerced argument values for this field.
    pub arguments: Object,

    /// The ambient, user-supplied request context.
    pub context: Context,

    /// Observed by long-running resolvers to abandon work early; a resolver
    /// past its point of no return may finish, its result is discarded.
    pub cancellation: CancellationToken,

    /// The response path of the field being resolved.
    pub path: Path,

    /// The runtime type name of the parent object.
    pub parent_type: String,

    /// The schema name of the field being resolved (not its alias).
    pub field_name: String,

    /// The declared type of the field being resolved.
    pub field_type: FieldType,
}

impl ResolverContext {
    /// Look up a coerced argument value by name.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// What a resolver invocation hands back to the engine.
pub enum ResolverOutput {
    /// A value (or error) that was produced synchronously.
    Ready(Result<Value, ResolverError>),

    /// Work that still has to run; the engine awaits it on the worker pool.
    Deferred(BoxFuture<'static, Result<Value, ResolverError>>),
}

/// A field resolver.
pub trait Resolver: Send + Sync {
    fn resolve(&self, ctx: ResolverContext) -> ResolverOutput;
}

/// Wrap a synchronous function as a [`Resolver`].
pub fn from_fn<F>(f: F) -> Arc<dyn Resolver>
where
    F: Fn(ResolverContext) -> Result<Value, ResolverError> + Send + Sync + 'static,
{
    Arc::new(SyncResolver(f))
}

/// Wrap an asynchronous function as a [`Resolver`].
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Resolver>
where
    F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
{
    Arc::new(AsyncResolver {
        f,
        _marker: PhantomData,
    })
}

struct SyncResolver<F>(F);

impl<F> Resolver for SyncResolver<F>
where
    F: Fn(ResolverContext) -> Result<Value, ResolverError> + Send + Sync,
{
    fn resolve(&self, ctx: ResolverContext) -> ResolverOutput {
        ResolverOutput::Ready((self.0)(ctx))
    }
}

struct AsyncResolver<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> Resolver for AsyncResolver<F, Fut>
where
    F: Fn(ResolverContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
{
    fn resolve(&self, ctx: ResolverContext) -> ResolverOutput {
        ResolverOutput::Deferred(Box::pin((self.f)(ctx)))
    }
}

/// The subscription-side contract: instead of a value, the subscribed
/// field's hook returns a push-based [`EventSource`] of raw event payloads.
pub type SubscribeFn =
    Arc<dyn Fn(ResolverContext) -> BoxFuture<'static, Result<EventSource, ResolverError>> + Send + Sync>;

//! An asynchronous GraphQL query execution engine.
//!
//! Given a validated query document, a schema with registered resolvers,
//! variable values and a root value, the engine walks the selection set and
//! assembles a JSON-shaped result tree with the partial-failure semantics
//! of the GraphQL execution specification: fragment-expanding field
//! collection, `@skip`/`@include`, per-field error isolation and null
//! propagation to the nearest nullable ancestor.
//!
//! Queries resolve their root fields in parallel, mutations serially (side
//! effects stay ordered), and subscriptions turn one root field into a live
//! sequence of independently executed result trees that reach the
//! subscriber in upstream event order.
//!
//! Parsing, validation, transports and JSON encoding are deliberately not
//! here: the engine consumes a pre-parsed [`ast::Document`] and hands back
//! [`graphql::Response`] values ready for any serializer.

#![cfg_attr(feature = "failfast", allow(unreachable_code))]
#![warn(unreachable_pub)]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

pub mod ast;
mod context;
pub mod error;
pub mod execution;
pub mod graphql;
pub mod json_ext;
pub mod resolver;
pub mod schema;

pub use context::Context;
pub use error::ExecutionError;
pub use error::ResolverError;
pub use execution::EventEmitter;
pub use execution::EventSource;
pub use execution::ExecutionOutcome;
pub use execution::Executor;
pub use execution::Instrumentation;
pub use execution::SubscriptionStream;
pub use execution::event_source;
pub use graphql::Request;
pub use graphql::Response;
pub use schema::Schema;

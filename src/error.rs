//! Engine errors.

use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::ast::OperationKind;
use crate::ast::Position;
use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Request-fatal error conditions.
///
/// Nothing in normal field resolution is fatal to the whole request: field
/// failures are recovered locally and recorded as [`graphql::Error`]s. The
/// conditions below abort before (or instead of) node resolution and are
/// converted to JSON for [`struct@graphql::Error`].
#[derive(Error, Display, Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum ExecutionError {
    /// unknown operation '{name}'
    UnknownOperation {
        /// Name of the requested operation.
        name: String,
    },

    /// the document contains multiple operations and no operation name was provided
    AmbiguousOperation,

    /// the document contains no operation
    NoOperation,

    /// the schema does not define a {kind} root type
    RootTypeUndefined {
        /// The kind of the selected operation.
        kind: OperationKind,
    },

    /// invalid type for variable: '{name}'
    InvalidVariableType {
        /// Name of the variable.
        name: String,
    },

    /// subscription operations must select exactly one root field
    InvalidSubscriptionSelection,

    /// field '{field}' does not have an event source and cannot be subscribed to
    NotSubscribable {
        /// The subscription root field.
        field: String,
    },

    /// event source for field '{field}' closed with an error: {reason}
    EventSourceFailed {
        /// The subscription root field.
        field: String,

        /// The reason the event source failed.
        reason: String,
    },

    /// execution cancelled
    Cancelled,
}

impl ExecutionError {
    /// Convert the execution error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let value: Value = serde_json_bytes::to_value(self).unwrap_or_default();
        let mut extensions = match value {
            Value::Object(object) => object,
            _ => Object::default(),
        };
        extensions
            .entry("code")
            .or_insert_with(|| self.extension_code().into());

        graphql::Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extensions(extensions)
            .build()
    }

    /// Convert the error to a response carrying no data.
    pub fn to_response(&self) -> Response {
        Response::from_errors(vec![self.to_graphql_error(None)])
    }
}

impl ErrorExtension for ExecutionError {
    fn extension_code(&self) -> String {
        match self {
            ExecutionError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            ExecutionError::AmbiguousOperation => "AMBIGUOUS_OPERATION",
            ExecutionError::NoOperation => "NO_OPERATION",
            ExecutionError::RootTypeUndefined { .. } => "ROOT_TYPE_UNDEFINED",
            ExecutionError::InvalidVariableType { .. } => "INVALID_VARIABLE_TYPE",
            ExecutionError::InvalidSubscriptionSelection => "INVALID_SUBSCRIPTION_SELECTION",
            ExecutionError::NotSubscribable { .. } => "NOT_SUBSCRIBABLE",
            ExecutionError::EventSourceFailed { .. } => "EVENT_SOURCE_FAILED",
            ExecutionError::Cancelled => "EXECUTION_CANCELLED",
        }
        .to_string()
    }
}

/// A failure raised by user code: a resolver, a subscribe hook, or an event
/// source. Scoped to one field; recorded with the field's response path and
/// document location, never unwound across the engine.
#[derive(Error, Debug, Clone, Default)]
#[error("{message}")]
pub struct ResolverError {
    /// The error message.
    pub message: String,

    /// Optional GraphQL extensions attached to the reported error.
    pub extensions: Object,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: Object::default(),
        }
    }

    /// Attach one extension entry.
    pub fn extension(
        mut self,
        key: impl Into<serde_json_bytes::ByteString>,
        value: impl Into<Value>,
    ) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Convert to a GraphQL error located at `path`.
    pub(crate) fn to_graphql_error(
        self,
        path: Path,
        position: Option<Position>,
    ) -> graphql::Error {
        let locations: Vec<graphql::Location> =
            position.map(|position| vec![position.into()]).unwrap_or_default();
        graphql::Error::builder()
            .message(self.message)
            .path(path)
            .locations(locations)
            .extensions(self.extensions)
            .build()
    }
}

impl From<&str> for ResolverError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ResolverError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_carries_code_and_fields() {
        let error = ExecutionError::UnknownOperation {
            name: "Missing".to_string(),
        }
        .to_graphql_error(None);

        assert_eq!(error.message, "unknown operation 'Missing'");
        assert_eq!(error.extension_code().as_deref(), Some("UNKNOWN_OPERATION"));
        assert_eq!(
            error.extensions.get("name"),
            Some(&Value::String("Missing".into())),
        );
    }

    #[test]
    fn unit_variants_serialize_to_a_bare_code() {
        let error = ExecutionError::Cancelled.to_graphql_error(None);
        assert_eq!(error.message, "execution cancelled");
        assert_eq!(
            error.extension_code().as_deref(),
            Some("EXECUTION_CANCELLED"),
        );
    }

    #[test]
    fn resolver_error_reports_path_and_location() {
        let error = ResolverError::new("boom")
            .extension("service", "users")
            .to_graphql_error(Path::from("viewer/name"), Some(Position::new(3, 9)));
        assert_eq!(error.message, "boom");
        assert_eq!(error.path, Some(Path::from("viewer/name")));
        assert_eq!(error.locations, vec![graphql::Location { line: 3, column: 9 }]);
        assert_eq!(
            error.extensions.get("service"),
            Some(&Value::String("users".into())),
        );
    }
}

use std::sync::Arc;

use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use tokio_util::sync::CancellationToken;

use crate::ast::Document;
use crate::context::Context;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// One execution request.
///
/// The document is taken pre-parsed and pre-validated: the engine trusts the
/// type information a validator has already checked against the schema and
/// does not re-validate.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Request {
    /// The validated query document.
    pub document: Arc<Document>,

    /// The name of the operation to execute, when the document contains more
    /// than one.
    pub operation_name: Option<String>,

    /// The variable values supplied with the request, before coercion
    /// against the operation's variable definitions.
    pub variables: Object,

    /// The root value the top-level selection set resolves against.
    pub root: Value,

    /// The ambient, user-supplied request context handed to every resolver.
    pub context: Context,

    /// Cancelling this token abandons the whole execution (or tears down one
    /// subscriber for subscriptions).
    pub cancellation: CancellationToken,

    /// The optional GraphQL request extensions.
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Request {
    /// Returns a builder that builds a [`Request`].
    ///
    /// `document` is required; everything else defaults to empty values and
    /// a fresh cancellation token.
    #[builder(visibility = "pub")]
    fn new(
        document: Arc<Document>,
        operation_name: Option<String>,
        variables: Map<ByteString, Value>,
        root: Option<Value>,
        context: Option<Context>,
        cancellation: Option<CancellationToken>,
        extensions: Map<ByteString, Value>,
    ) -> Self {
        Self {
            document,
            operation_name,
            variables,
            root: root.unwrap_or(Value::Null),
            context: context.unwrap_or_default(),
            cancellation: cancellation.unwrap_or_default(),
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::ast::Field;
    use crate::ast::Operation;

    #[test]
    fn request_defaults() {
        let document = Arc::new(
            Document::builder()
                .operation(
                    Operation::builder()
                        .selection(Field::builder().name("hero").build())
                        .build(),
                )
                .build(),
        );
        let request = Request::builder()
            .document(document)
            .variable("episode", json!("JEDI"))
            .build();

        assert_eq!(request.root, Value::Null);
        assert!(request.operation_name.is_none());
        assert_eq!(request.variables.get("episode"), Some(&json!("JEDI")));
        assert!(!request.cancellation.is_cancelled());
    }
}

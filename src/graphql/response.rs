use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// One GraphQL execution result: the data tree produced for a query, a
/// mutation, or a single subscription event, together with the errors that
/// were recovered while producing it.
///
/// The `data` tree is a generic nested structure suitable for handoff to any
/// serializer; the engine does not itself encode JSON.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The graphql errors encountered while producing `data`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        extensions: Map<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Build a response carrying only errors, no data.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    /// append_errors default the errors `path` with the one provided.
    pub fn append_errors(&mut self, errors: &mut Vec<Error>) {
        self.errors.append(errors)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::json_ext::Path;

    #[test]
    fn response_serde_round_trip() {
        let response = Response::builder()
            .data(json!({
                "hero": {
                    "name": "R2-D2",
                    "heroFriends": [
                        { "id": "1000", "name": "Luke Skywalker" },
                        { "id": "1002", "name": null },
                    ],
                },
            }))
            .error(
                Error::builder()
                    .message("Name for character with ID 1002 could not be fetched.")
                    .path(Path::from("hero/heroFriends/1/name"))
                    .build(),
            )
            .build();

        let serialized = serde_json_bytes::to_value(&response).unwrap();
        assert_eq!(
            serialized
                .as_object()
                .unwrap()
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>(),
            vec!["data", "errors"],
        );
        let deserialized: Response = serde_json_bytes::from_value(serialized).unwrap();
        assert_eq!(deserialized, response);
    }

    #[test]
    fn empty_error_list_is_not_serialized() {
        let response = Response::builder().data(json!({ "ok": true })).build();
        let serialized = serde_json_bytes::to_value(&response).unwrap();
        assert!(serialized.as_object().unwrap().get("errors").is_none());
    }

    #[test]
    fn response_deserializes_from_the_wire_format() {
        let response = serde_json::from_str::<Response>(
            serde_json::json!({
                "errors": [
                    {
                        "message": "Name for character with ID 1002 could not be fetched.",
                        "locations": [{ "line": 6, "column": 7 }],
                        "path": ["hero", "heroFriends", 1, "name"],
                    }
                ],
                "data": {
                    "hero": {
                        "name": "R2-D2",
                        "heroFriends": [
                            { "id": "1000", "name": "Luke Skywalker" },
                            { "id": "1002", "name": null },
                        ],
                    },
                },
            })
            .to_string()
            .as_str(),
        )
        .unwrap();

        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path,
            Some(Path::from("hero/heroFriends/1/name")),
        );
        assert_eq!(
            response.errors[0].locations,
            vec![crate::graphql::Location { line: 6, column: 7 }],
        );
        assert!(response.data.is_some());
    }
}

//! The execution node model.
//!
//! Every position of the output tree (the root, one object, one list, one
//! leaf) is resolved to exactly one terminal state: `Ok` with its final
//! value, or `Err(InvalidValue)` when the position was declared non-null
//! and failed. The `Err` marker is data, produced once by the future that
//! resolved the node and interpreted by the parent node's assembly step —
//! a nullable parent absorbs it by nulling its own subtree, a non-null
//! parent passes it further up. No unwinding crosses a strategy boundary.

use serde_json_bytes::ByteString;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::schema::InvalidValue;

/// The terminal state of one node of the output tree.
pub(crate) type NodeResult = Result<Value, InvalidValue>;

/// Assemble an object node from its resolved children, preserving the
/// grouped field set's document order.
///
/// A child arrives as `Err` only when its declared type is non-null and it
/// failed; that nulls out this whole object, propagating the marker.
pub(crate) fn assemble_object(
    entries: impl IntoIterator<Item = (ByteString, NodeResult)>,
) -> NodeResult {
    let mut object = Object::default();
    for (response_key, node) in entries {
        object.insert(response_key, node?);
    }
    Ok(Value::Object(object))
}

/// Assemble a list node from its resolved items, preserving index order.
pub(crate) fn assemble_list(items: impl IntoIterator<Item = NodeResult>) -> NodeResult {
    Ok(Value::Array(
        items.into_iter().collect::<Result<Vec<_>, _>>()?,
    ))
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn object_assembly_preserves_entry_order() {
        let assembled = assemble_object(vec![
            (ByteString::from("b"), Ok(json!(2))),
            (ByteString::from("a"), Ok(json!(1))),
        ])
        .unwrap();
        assert_eq!(
            assembled
                .as_object()
                .unwrap()
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>(),
            vec!["b", "a"],
        );
    }

    #[test]
    fn errored_child_nulls_the_whole_object() {
        let assembled = assemble_object(vec![
            (ByteString::from("ok"), Ok(json!(1))),
            (ByteString::from("failed"), Err(InvalidValue)),
        ]);
        assert!(assembled.is_err());
    }

    #[test]
    fn errored_item_nulls_the_whole_list() {
        assert_eq!(
            assemble_list(vec![Ok(json!(1)), Ok(json!(2))]).unwrap(),
            json!([1, 2]),
        );
        assert!(assemble_list(vec![Ok(json!(1)), Err(InvalidValue)]).is_err());
    }
}

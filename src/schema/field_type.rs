use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::ast::TypeReference;
use crate::json_ext::Value;
use crate::schema::Schema;

/// Marker for a value that does not fit its declared type.
///
/// During output completion this doubles as the propagated error marker of
/// the null-bubbling rule: a failed non-null position returns
/// `Err(InvalidValue)` to its parent, as data, until a nullable ancestor
/// absorbs it. It never crosses a strategy boundary by unwinding.
#[derive(Debug, Eq, PartialEq)]
pub struct InvalidValue;

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Named(String),
    List(Box<FieldType>),
    NonNull(Box<FieldType>),
    String,
    Int,
    Float,
    Id,
    Boolean,
}

impl FieldType {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: FieldType) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Validate an input value (an argument or a variable) against this type.
    pub(crate) fn validate_input_value(
        &self,
        value: &Value,
        schema: &Schema,
    ) -> Result<(), InvalidValue> {
        match (self, value) {
            // Type coercion from string to Int, Float or Boolean
            (FieldType::Int | FieldType::Float | FieldType::Boolean, Value::String(s)) => {
                if let Ok(value) = Value::from_bytes(s.inner().clone()) {
                    self.validate_input_value(&value, schema)
                } else {
                    Err(InvalidValue)
                }
            }
            (FieldType::String, Value::String(_)) => Ok(()),
            // Spec: https://spec.graphql.org/draft/#sec-Int
            (FieldType::Int, Value::Number(number)) if number.is_i64() || number.is_u64() => {
                if number
                    .as_i64()
                    .and_then(|x| i32::try_from(x).ok())
                    .is_some()
                    || number
                        .as_u64()
                        .and_then(|x| i32::try_from(x).ok())
                        .is_some()
                {
                    Ok(())
                } else {
                    Err(InvalidValue)
                }
            }
            // Spec: https://spec.graphql.org/draft/#sec-Float
            (FieldType::Float, Value::Number(_)) => Ok(()),
            // "The ID scalar type represents a unique identifier, often used to refetch an object
            // or as the key for a cache. The ID type is serialized in the same way as a String;
            // however, it is not intended to be human-readable. While it is often numeric, it
            // should always serialize as a String."
            //
            // In practice it seems Int works too
            (FieldType::Id, Value::String(_) | Value::Number(_)) => Ok(()),
            (FieldType::Boolean, Value::Bool(_)) => Ok(()),
            (FieldType::List(inner_ty), Value::Array(vec)) => vec
                .iter()
                .try_for_each(|x| inner_ty.validate_input_value(x, schema)),
            (FieldType::NonNull(inner_ty), value) => {
                if value.is_null() {
                    Err(InvalidValue)
                } else {
                    inner_ty.validate_input_value(value, schema)
                }
            }
            // NOTE: graphql's types are all optional by default
            (_, Value::Null) => Ok(()),
            (FieldType::Named(name), value) if schema.scalar(name).is_some() => {
                let scalar = schema.scalar(name).expect("just checked above; qed");
                scalar.parse(value)
            }
            (FieldType::Named(name), value) if schema.enum_values(name).is_some() => value
                .as_str()
                .filter(|s| {
                    schema
                        .enum_values(name)
                        .expect("just checked above; qed")
                        .contains(*s)
                })
                .map(|_| ())
                .ok_or(InvalidValue),
            (FieldType::Named(name), value) if value.is_object() => {
                if let Some(input_ty) = schema.input_object(name) {
                    input_ty
                        .validate_object(value.as_object().expect("just checked above; qed"), schema)
                } else {
                    Err(InvalidValue)
                }
            }
            _ => Err(InvalidValue),
        }
    }

    /// Return the name of the type on which selections happen.
    ///
    /// Example: if we get the field `list: [User!]!`, it will return "User".
    pub fn inner_type_name(&self) -> Option<&str> {
        match self {
            FieldType::Named(name) => Some(name.as_str()),
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            FieldType::String
            | FieldType::Int
            | FieldType::Float
            | FieldType::Id
            | FieldType::Boolean => None,
        }
    }

    pub fn is_builtin_scalar(&self) -> bool {
        match self {
            FieldType::Named(_) | FieldType::List(_) | FieldType::NonNull(_) => false,
            FieldType::String
            | FieldType::Int
            | FieldType::Float
            | FieldType::Id
            | FieldType::Boolean => true,
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Named(name) => write!(f, "{name}"),
            FieldType::List(inner) => write!(f, "[{inner}]"),
            FieldType::NonNull(inner) => write!(f, "{inner}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl From<&TypeReference> for FieldType {
    // Spec: https://spec.graphql.org/draft/#sec-Type-References
    fn from(ty: &TypeReference) -> Self {
        match ty {
            TypeReference::Named(name) => match name.as_str() {
                "String" => Self::String,
                "Int" => Self::Int,
                "Float" => Self::Float,
                "ID" => Self::Id,
                "Boolean" => Self::Boolean,
                _ => Self::Named(name.clone()),
            },
            TypeReference::List(inner) => Self::List(Box::new(inner.as_ref().into())),
            TypeReference::NonNull(inner) => Self::NonNull(Box::new(inner.as_ref().into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::schema::EnumType;
    use crate::schema::ObjectType;

    fn schema() -> Schema {
        Schema::builder()
            .query("Query")
            .object(ObjectType::new("Query"))
            .enum_type(EnumType::new("Episode").value("NEWHOPE").value("JEDI"))
            .build()
    }

    #[test]
    fn int_values_must_fit_in_32_bits() {
        let schema = schema();
        assert!(FieldType::Int
            .validate_input_value(&json!(42), &schema)
            .is_ok());
        assert!(FieldType::Int
            .validate_input_value(&json!(i64::from(i32::MAX) + 1), &schema)
            .is_err());
        // string to int coercion
        assert!(FieldType::Int
            .validate_input_value(&json!("42"), &schema)
            .is_ok());
    }

    #[test]
    fn non_null_rejects_null_and_nullable_accepts_it() {
        let schema = schema();
        let non_null_string = FieldType::non_null(FieldType::String);
        assert!(non_null_string
            .validate_input_value(&Value::Null, &schema)
            .is_err());
        assert!(FieldType::String
            .validate_input_value(&Value::Null, &schema)
            .is_ok());
    }

    #[test]
    fn lists_validate_each_item() {
        let schema = schema();
        let list = FieldType::list(FieldType::non_null(FieldType::Boolean));
        assert!(list
            .validate_input_value(&json!([true, false]), &schema)
            .is_ok());
        assert!(list
            .validate_input_value(&json!([true, null]), &schema)
            .is_err());
    }

    #[test]
    fn enums_validate_membership() {
        let schema = schema();
        let episode = FieldType::named("Episode");
        assert!(episode.validate_input_value(&json!("JEDI"), &schema).is_ok());
        assert!(episode
            .validate_input_value(&json!("EMPIRE"), &schema)
            .is_err());
    }

    #[test]
    fn display_uses_graphql_notation() {
        let ty = FieldType::non_null(FieldType::list(FieldType::non_null(FieldType::named(
            "User",
        ))));
        assert_eq!(ty.to_string(), "[User!]!");
    }
}

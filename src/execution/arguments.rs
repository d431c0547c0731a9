//! Input coercion: operation variables and field arguments.

use serde_json_bytes::ByteString;

use crate::ast;
use crate::ast::Operation;
use crate::error::ExecutionError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::schema::FieldDefinition;
use crate::schema::FieldType;
use crate::schema::Schema;

/// Coerce the variable values supplied with a request against the
/// operation's variable definitions: apply declared defaults, then validate
/// each value against its declared type.
///
/// Failures here are request-level errors; execution does not start.
pub(crate) fn coerce_variable_values(
    schema: &Schema,
    operation: &Operation,
    variables: &Object,
) -> Result<Object, Vec<graphql::Error>> {
    let mut coerced = Object::default();
    let mut errors = Vec::new();

    for definition in &operation.variable_definitions {
        let ty = FieldType::from(&definition.ty);
        let name = ByteString::from(definition.name.as_str());
        match variables.get(definition.name.as_str()) {
            Some(value) => {
                if ty.validate_input_value(value, schema).is_err() {
                    errors.push(
                        ExecutionError::InvalidVariableType {
                            name: definition.name.clone(),
                        }
                        .to_graphql_error(None),
                    );
                } else {
                    coerced.insert(name, value.clone());
                }
            }
            None => match &definition.default_value {
                Some(default) => {
                    // defaults were parsed out of the document and cannot
                    // reference other variables
                    coerced.insert(name, literal_to_value(default, &coerced));
                }
                None if ty.is_non_null() => {
                    errors.push(
                        ExecutionError::InvalidVariableType {
                            name: definition.name.clone(),
                        }
                        .to_graphql_error(None),
                    );
                }
                None => {}
            },
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

/// Coerce one field's argument values: merge declared defaults, document
/// literals and variable substitutions, then type-check the result.
///
/// Failures are field-level errors; the caller records them and nulls the
/// field.
pub(crate) fn coerce_argument_values(
    schema: &Schema,
    definition: &FieldDefinition,
    field: &ast::Field,
    variables: &Object,
) -> Result<Object, String> {
    let mut coerced = Object::default();

    for argument in definition.argument_definitions() {
        let provided = field
            .arguments
            .iter()
            .find(|a| a.name == argument.name)
            .map(|a| &a.value);

        // an unset variable counts as an absent argument, falling back to
        // the declared default
        let value = match provided {
            Some(ast::Value::Variable(name)) if !variables.contains_key(name.as_str()) => None,
            Some(value) => Some(literal_to_value(value, variables)),
            None => None,
        };

        match value {
            Some(value) => {
                if argument.ty.validate_input_value(&value, schema).is_err() {
                    return Err(format!(
                        "invalid value for argument '{}' on field '{}'",
                        argument.name, field.name,
                    ));
                }
                coerced.insert(argument.name.as_str(), value);
            }
            None => match &argument.default_value {
                Some(default) => {
                    coerced.insert(argument.name.as_str(), default.clone());
                }
                None if argument.ty.is_non_null() => {
                    return Err(format!(
                        "missing value for required argument '{}' on field '{}'",
                        argument.name, field.name,
                    ));
                }
                None => {}
            },
        }
    }

    Ok(coerced)
}

/// Convert a document literal to a runtime value, substituting variable
/// references. An unknown variable becomes null; validation has already
/// checked that variables used in non-null positions are provided.
pub(crate) fn literal_to_value(literal: &ast::Value, variables: &Object) -> Value {
    match literal {
        ast::Value::Null => Value::Null,
        ast::Value::Int(i) => (*i).into(),
        ast::Value::Float(f) => (*f).into(),
        ast::Value::String(s) => s.as_str().into(),
        ast::Value::Boolean(b) => (*b).into(),
        ast::Value::Enum(name) => name.as_str().into(),
        ast::Value::List(values) => Value::Array(
            values
                .iter()
                .map(|value| literal_to_value(value, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| {
                    (
                        ByteString::from(name.as_str()),
                        literal_to_value(value, variables),
                    )
                })
                .collect(),
        ),
        ast::Value::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .unwrap_or(Value::Null),
    }
}

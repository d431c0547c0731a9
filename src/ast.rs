//! The executable document model.
//!
//! These are the immutable nodes produced by a parser ahead of execution:
//! a [`Document`] owns operations and fragment definitions, operations own
//! selection sets, and selections reference fragments by name. The engine
//! only ever reads this tree; it never mutates it.
//!
//! The nodes carry builders so that embedders (and tests) can produce
//! documents without going through a parser.

use std::collections::HashMap;

use serde::Serialize;

/// A position in the source text of the original query document.
///
/// Line and column are 1-indexed, per the GraphQL response format for error
/// locations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The root container of an executable document.
///
/// Spec: <https://spec.graphql.org/draft/#sec-Document>
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Document {
    pub operations: Vec<Operation>,
    pub fragments: HashMap<String, FragmentDefinition>,
}

#[buildstructor::buildstructor]
impl Document {
    #[builder(visibility = "pub")]
    fn new(operations: Vec<Operation>, fragments: Vec<FragmentDefinition>) -> Self {
        Self {
            operations,
            fragments: fragments
                .into_iter()
                .map(|fragment| (fragment.name.clone(), fragment))
                .collect(),
        }
    }

    /// Look up a fragment definition by name.
    pub fn fragment(&self, name: impl AsRef<str>) -> Option<&FragmentDefinition> {
        self.fragments.get(name.as_ref())
    }
}

/// The kind of an operation.
///
/// Spec: <https://spec.graphql.org/draft/#OperationType>
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

/// One operation definition.
///
/// Spec: <https://spec.graphql.org/draft/#sec-Language.Operations>
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Operation {
    pub name: Option<String>,
    pub kind: OperationKind,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[buildstructor::buildstructor]
impl Operation {
    #[builder(visibility = "pub")]
    fn new(
        name: Option<String>,
        kind: Option<OperationKind>,
        variables: Vec<VariableDefinition>,
        directives: Vec<Directive>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            name,
            kind: kind.unwrap_or_default(),
            variable_definitions: variables,
            directives,
            selection_set: SelectionSet { selections },
        }
    }
}

/// A declared operation variable: name, type and optional default.
///
/// Spec: <https://spec.graphql.org/draft/#VariableDefinition>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeReference,
    pub default_value: Option<Value>,
}

#[buildstructor::buildstructor]
impl VariableDefinition {
    #[builder(visibility = "pub")]
    fn new(name: String, ty: TypeReference, default_value: Option<Value>) -> Self {
        Self {
            name,
            ty,
            default_value,
        }
    }
}

/// A reference to a schema type, as written in the document.
///
/// Spec: <https://spec.graphql.org/draft/#sec-Type-References>
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum TypeReference {
    Named(String),
    List(Box<TypeReference>),
    NonNull(Box<TypeReference>),
}

impl TypeReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeReference) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeReference) -> Self {
        Self::NonNull(Box::new(inner))
    }
}

/// A set of selections under an operation, a field or a fragment.
///
/// Spec: <https://spec.graphql.org/draft/#sec-Selection-Sets>
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

impl From<Vec<Selection>> for SelectionSet {
    fn from(selections: Vec<Selection>) -> Self {
        Self { selections }
    }
}

/// One selection inside a selection set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<FragmentSpread> for Selection {
    fn from(spread: FragmentSpread) -> Self {
        Self::FragmentSpread(spread)
    }
}

impl From<InlineFragment> for Selection {
    fn from(fragment: InlineFragment) -> Self {
        Self::InlineFragment(fragment)
    }
}

/// A field selection.
///
/// Spec: <https://spec.graphql.org/draft/#Field>
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub position: Option<Position>,
}

#[buildstructor::buildstructor]
impl Field {
    #[builder(visibility = "pub")]
    fn new(
        alias: Option<String>,
        name: String,
        arguments: Vec<Argument>,
        directives: Vec<Directive>,
        selections: Vec<Selection>,
        position: Option<Position>,
    ) -> Self {
        Self {
            alias,
            name,
            arguments,
            directives,
            selection_set: SelectionSet { selections },
            position,
        }
    }

    /// The key under which this field appears in the response: its alias if
    /// present, its name otherwise.
    ///
    /// Spec: <https://spec.graphql.org/draft/#sec-Field-Alias>
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A named fragment spread.
///
/// Spec: <https://spec.graphql.org/draft/#FragmentSpread>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
}

#[buildstructor::buildstructor]
impl FragmentSpread {
    #[builder(visibility = "pub")]
    fn new(name: String, directives: Vec<Directive>) -> Self {
        Self { name, directives }
    }
}

/// An inline fragment, with an optional type condition.
///
/// Spec: <https://spec.graphql.org/draft/#InlineFragment>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[buildstructor::buildstructor]
impl InlineFragment {
    #[builder(visibility = "pub")]
    fn new(
        type_condition: Option<String>,
        directives: Vec<Directive>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            type_condition,
            directives,
            selection_set: SelectionSet { selections },
        }
    }
}

/// A named fragment definition.
///
/// Spec: <https://spec.graphql.org/draft/#FragmentDefinition>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[buildstructor::buildstructor]
impl FragmentDefinition {
    #[builder(visibility = "pub")]
    fn new(
        name: String,
        type_condition: String,
        directives: Vec<Directive>,
        selections: Vec<Selection>,
    ) -> Self {
        Self {
            name,
            type_condition,
            directives,
            selection_set: SelectionSet { selections },
        }
    }
}

/// A directive applied to a selection, an operation or a fragment.
///
/// Spec: <https://spec.graphql.org/draft/#sec-Language.Directives>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
}

#[buildstructor::buildstructor]
impl Directive {
    #[builder(visibility = "pub")]
    fn new(name: String, arguments: Vec<Argument>) -> Self {
        Self { name, arguments }
    }

    /// Look up an argument value by name.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|argument| argument.name == name)
            .map(|argument| &argument.value)
    }
}

/// One argument of a field or directive.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,
    pub value: Value,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A literal value as written in the document.
///
/// `Variable` is a reference to an operation variable; it is substituted
/// with the variable's runtime value during argument coercion.
///
/// Spec: <https://spec.graphql.org/draft/#Value>
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
    Variable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_key_is_alias_or_name() {
        let field = Field::builder().name("hero").build();
        assert_eq!(field.response_key(), "hero");

        let field = Field::builder().name("hero").alias("mainCharacter").build();
        assert_eq!(field.response_key(), "mainCharacter");
    }

    #[test]
    fn document_builder_keys_fragments_by_name() {
        let document = Document::builder()
            .operation(Operation::builder().build())
            .fragment(
                FragmentDefinition::builder()
                    .name("heroFields")
                    .type_condition("Character")
                    .selection(Field::builder().name("name").build())
                    .build(),
            )
            .build();

        assert_eq!(
            document.fragment("heroFields").map(|f| f.name.as_str()),
            Some("heroFields"),
        );
        assert!(document.fragment("unknown").is_none());
    }

    #[test]
    fn directive_argument_lookup() {
        let directive = Directive::builder()
            .name("skip")
            .argument(Argument::new("if", Value::Boolean(true)))
            .build();
        assert_eq!(directive.argument("if"), Some(&Value::Boolean(true)));
        assert_eq!(directive.argument("unless"), None);
    }
}

//! The schema as seen by the execution engine.
//!
//! Construction is programmatic: the embedder registers its types, wires a
//! resolver onto each field that needs one, and hands the finished
//! [`Schema`] to an [`Executor`][crate::execution::Executor]. At execution
//! time the schema is a read-only lookup service: type descriptors by name,
//! runtime-type resolution for abstract types, and the resolver table.

mod field_type;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use derivative::Derivative;
pub use field_type::FieldType;
pub use field_type::InvalidValue;
use futures::Future;

use crate::ast::OperationKind;
use crate::error::ResolverError;
use crate::execution::EventSource;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::resolver::Resolver;
use crate::resolver::ResolverContext;
use crate::resolver::SubscribeFn;

pub(crate) const TYPENAME: &str = "__typename";

/// Resolves the concrete runtime type name of a value for an interface or
/// union, when the value does not carry a `__typename` property.
pub type TypeResolverFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

type ScalarFn = Arc<dyn Fn(&Value) -> Result<Value, InvalidValue> + Send + Sync>;

/// A GraphQL schema: named types, root operation types, and the resolver
/// registration table.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Schema {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    object_types: HashMap<String, ObjectType>,
    interfaces: HashMap<String, InterfaceType>,
    unions: HashMap<String, UnionType>,
    enums: HashMap<String, HashSet<String>>,
    #[derivative(Debug = "ignore")]
    custom_scalars: HashMap<String, ScalarType>,
    input_types: HashMap<String, InputObjectType>,
}

#[buildstructor::buildstructor]
impl Schema {
    /// Returns a builder that builds a [`Schema`].
    ///
    /// `query` (the name of the query root type) is required; register types
    /// with the singular `.object()`, `.interface()`, `.union()`,
    /// `.enum_type()`, `.scalar()` and `.input()` methods.
    #[builder(visibility = "pub")]
    fn new(
        query: String,
        mutation: Option<String>,
        subscription: Option<String>,
        objects: Vec<ObjectType>,
        interfaces: Vec<InterfaceType>,
        unions: Vec<UnionType>,
        enum_types: Vec<EnumType>,
        scalars: Vec<ScalarType>,
        inputs: Vec<InputObjectType>,
    ) -> Self {
        Self {
            query_type: query,
            mutation_type: mutation,
            subscription_type: subscription,
            object_types: objects
                .into_iter()
                .map(|object| (object.name.clone(), object))
                .collect(),
            interfaces: interfaces
                .into_iter()
                .map(|interface| (interface.name.clone(), interface))
                .collect(),
            unions: unions
                .into_iter()
                .map(|union| (union.name.clone(), union))
                .collect(),
            enums: enum_types
                .into_iter()
                .map(|enum_type| (enum_type.name, enum_type.values))
                .collect(),
            custom_scalars: scalars
                .into_iter()
                .map(|scalar| (scalar.name.clone(), scalar))
                .collect(),
            input_types: inputs
                .into_iter()
                .map(|input| (input.name.clone(), input))
                .collect(),
        }
    }

    /// The name of the root operation type for `kind`, if the schema
    /// defines one.
    pub fn root_operation_name(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(self.query_type.as_str()),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.object_types.get(name)
    }

    pub(crate) fn enum_values(&self, name: &str) -> Option<&HashSet<String>> {
        self.enums.get(name)
    }

    pub(crate) fn scalar(&self, name: &str) -> Option<&ScalarType> {
        self.custom_scalars.get(name)
    }

    pub(crate) fn input_object(&self, name: &str) -> Option<&InputObjectType> {
        self.input_types.get(name)
    }

    /// Whether `maybe_sub` is a member of the abstract type `abstract_type`:
    /// a union member, or an object implementing the interface.
    pub fn is_subtype(&self, abstract_type: &str, maybe_sub: &str) -> bool {
        if let Some(union) = self.unions.get(abstract_type) {
            return union.members.contains(maybe_sub);
        }
        self.object_types
            .get(maybe_sub)
            .map(|object| object.implements.iter().any(|i| i == abstract_type))
            .unwrap_or_default()
    }

    /// Determine the concrete object type of `value` at a position declared
    /// as `declared` (an object type name, an interface or a union).
    ///
    /// For abstract types the `__typename` property wins; the registered
    /// type resolver hook is consulted otherwise. `None` is a
    /// type-resolution failure, reported as a field error by the caller.
    pub(crate) fn resolve_runtime_type(
        &self,
        declared: &str,
        value: &Value,
    ) -> Option<&ObjectType> {
        if let Some(object) = self.object_types.get(declared) {
            return Some(object);
        }
        let type_name = match value
            .as_object()
            .and_then(|object| object.get(TYPENAME))
            .and_then(Value::as_str)
        {
            Some(type_name) => Some(type_name.to_string()),
            None => self.type_resolver(declared).and_then(|hook| hook(value)),
        }?;
        if !self.is_subtype(declared, &type_name) {
            return None;
        }
        self.object_types.get(type_name.as_str())
    }

    fn type_resolver(&self, name: &str) -> Option<&TypeResolverFn> {
        self.interfaces
            .get(name)
            .and_then(|interface| interface.type_resolver.as_ref())
            .or_else(|| {
                self.unions
                    .get(name)
                    .and_then(|union| union.type_resolver.as_ref())
            })
    }
}

/// An object type: named fields over a concrete value.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ObjectType {
    name: String,
    implements: Vec<String>,
    fields: HashMap<String, FieldDefinition>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implements: Vec::new(),
            fields: HashMap::new(),
        }
    }

    /// Declare that this type implements `interface`.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn field(mut self, definition: FieldDefinition) -> Self {
        self.fields.insert(definition.name.clone(), definition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn field_definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }
}

/// An interface type. Membership is declared on the object types
/// implementing it; the optional type resolver hook determines the runtime
/// type of values that do not carry `__typename`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct InterfaceType {
    name: String,
    #[derivative(Debug = "ignore")]
    type_resolver: Option<TypeResolverFn>,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_resolver: None,
        }
    }

    pub fn resolve_type_with(
        mut self,
        f: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.type_resolver = Some(Arc::new(f));
        self
    }
}

/// A union type and its member object types.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct UnionType {
    name: String,
    members: HashSet<String>,
    #[derivative(Debug = "ignore")]
    type_resolver: Option<TypeResolverFn>,
}

impl UnionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashSet::new(),
            type_resolver: None,
        }
    }

    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into());
        self
    }

    pub fn resolve_type_with(
        mut self,
        f: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.type_resolver = Some(Arc::new(f));
        self
    }
}

/// An enum type and its allowed values.
#[derive(Debug)]
pub struct EnumType {
    name: String,
    values: HashSet<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashSet::new(),
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.values.insert(value.into());
        self
    }
}

/// A custom scalar with its coercion hooks.
///
/// Without hooks, input values are accepted and output values passed through
/// untouched.
pub struct ScalarType {
    name: String,
    parse: Option<ScalarFn>,
    serialize: Option<ScalarFn>,
}

impl ScalarType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parse: None,
            serialize: None,
        }
    }

    /// Set the input coercion hook, applied to literal and variable-supplied
    /// values. Rejections become argument-level errors.
    pub fn parse_with(
        mut self,
        f: impl Fn(&Value) -> Result<Value, InvalidValue> + Send + Sync + 'static,
    ) -> Self {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Set the output coercion hook, applied to resolved values.
    /// Rejections become field errors and null the field per the non-null
    /// rule.
    pub fn serialize_with(
        mut self,
        f: impl Fn(&Value) -> Result<Value, InvalidValue> + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Some(Arc::new(f));
        self
    }

    pub(crate) fn parse(&self, value: &Value) -> Result<(), InvalidValue> {
        match &self.parse {
            Some(parse) => parse(value).map(|_| ()),
            None => Ok(()),
        }
    }

    pub(crate) fn serialize(&self, value: &Value) -> Result<Value, InvalidValue> {
        match &self.serialize {
            Some(serialize) => serialize(value),
            None => Ok(value.clone()),
        }
    }
}

/// An input object type, used to validate argument and variable values.
#[derive(Debug)]
pub struct InputObjectType {
    name: String,
    fields: HashMap<String, FieldType>,
}

impl InputObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub(crate) fn validate_object(
        &self,
        object: &Object,
        schema: &Schema,
    ) -> Result<(), InvalidValue> {
        for (key, value) in object {
            let ty = self.fields.get(key.as_str()).ok_or(InvalidValue)?;
            ty.validate_input_value(value, schema)?;
        }
        for (name, ty) in &self.fields {
            if ty.is_non_null() && !object.contains_key(name.as_str()) {
                return Err(InvalidValue);
            }
        }
        Ok(())
    }
}

/// One field of an object type: declared return type, declared arguments,
/// and the resolver (and, for subscription fields, subscribe hook)
/// registered for it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FieldDefinition {
    name: String,
    field_type: FieldType,
    arguments: HashMap<String, ArgumentDefinition>,
    #[derivative(Debug = "ignore")]
    resolver: Option<Arc<dyn Resolver>>,
    #[derivative(Debug = "ignore")]
    subscribe: Option<SubscribeFn>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            arguments: HashMap::new(),
            resolver: None,
            subscribe: None,
        }
    }

    /// Declare an argument.
    pub fn argument(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        self.arguments.insert(
            name.clone(),
            ArgumentDefinition {
                name,
                ty,
                default_value: None,
            },
        );
        self
    }

    /// Declare an argument with a default value.
    pub fn argument_with_default(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        default_value: Value,
    ) -> Self {
        let name = name.into();
        self.arguments.insert(
            name.clone(),
            ArgumentDefinition {
                name,
                ty,
                default_value: Some(default_value),
            },
        );
        self
    }

    /// Register a synchronous resolver for this field.
    pub fn resolve(
        mut self,
        f: impl Fn(ResolverContext) -> Result<Value, ResolverError> + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Some(crate::resolver::from_fn(f));
        self
    }

    /// Register an asynchronous resolver for this field.
    pub fn resolve_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
    {
        self.resolver = Some(crate::resolver::from_async_fn(f));
        self
    }

    /// Register a pre-built resolver for this field.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Register an asynchronous subscribe hook: invoked once per subscriber
    /// to obtain the field's event source.
    pub fn subscribe<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EventSource, ResolverError>> + Send + 'static,
    {
        self.subscribe = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Register a synchronous subscribe hook.
    pub fn subscribe_with(
        mut self,
        f: impl Fn(ResolverContext) -> Result<EventSource, ResolverError> + Send + Sync + 'static,
    ) -> Self {
        self.subscribe = Some(Arc::new(move |ctx| {
            let source = f(ctx);
            Box::pin(async move { source })
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub(crate) fn argument_definitions(&self) -> impl Iterator<Item = &ArgumentDefinition> {
        self.arguments.values()
    }

    pub(crate) fn registered_resolver(&self) -> Option<&Arc<dyn Resolver>> {
        self.resolver.as_ref()
    }

    pub(crate) fn subscribe_hook(&self) -> Option<&SubscribeFn> {
        self.subscribe.as_ref()
    }
}

/// One declared argument of a field.
#[derive(Debug)]
pub(crate) struct ArgumentDefinition {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) default_value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    fn starwars() -> Schema {
        Schema::builder()
            .query("Query")
            .object(ObjectType::new("Query"))
            .object(ObjectType::new("Human").implements("Character"))
            .object(ObjectType::new("Droid").implements("Character"))
            .object(ObjectType::new("Starship"))
            .interface(InterfaceType::new("Character"))
            .union(
                UnionType::new("SearchResult")
                    .member("Human")
                    .member("Starship"),
            )
            .build()
    }

    #[test]
    fn subtype_membership() {
        let schema = starwars();
        assert!(schema.is_subtype("Character", "Human"));
        assert!(schema.is_subtype("Character", "Droid"));
        assert!(!schema.is_subtype("Character", "Starship"));
        assert!(schema.is_subtype("SearchResult", "Starship"));
        assert!(!schema.is_subtype("SearchResult", "Droid"));
    }

    #[test]
    fn runtime_type_from_typename() {
        let schema = starwars();
        let value = json!({ "__typename": "Droid", "name": "R2-D2" });
        let object = schema.resolve_runtime_type("Character", &value).unwrap();
        assert_eq!(object.name(), "Droid");

        // a __typename outside the abstract type is a resolution failure
        let value = json!({ "__typename": "Starship" });
        assert!(schema.resolve_runtime_type("Character", &value).is_none());
    }

    #[test]
    fn runtime_type_from_hook() {
        let schema = Schema::builder()
            .query("Query")
            .object(ObjectType::new("Query"))
            .object(ObjectType::new("Human").implements("Character"))
            .interface(InterfaceType::new("Character").resolve_type_with(|value| {
                value
                    .as_object()
                    .filter(|o| o.contains_key("homePlanet"))
                    .map(|_| "Human".to_string())
            }))
            .build();

        let value = json!({ "homePlanet": "Tatooine" });
        let object = schema.resolve_runtime_type("Character", &value).unwrap();
        assert_eq!(object.name(), "Human");
        assert!(schema.resolve_runtime_type("Character", &json!({})).is_none());
    }
}

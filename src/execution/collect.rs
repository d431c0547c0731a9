//! Field collection.
//!
//! Converts a selection set plus a concrete runtime type into a grouped
//! field set: a document-ordered mapping from response key to the field
//! nodes that must be merged and jointly resolved, with fragment spreads
//! and inline fragments expanded and `@skip`/`@include` applied.
//!
//! Spec: <https://spec.graphql.org/draft/#sec-Field-Collection>

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast;
use crate::ast::Document;
use crate::ast::Selection;
use crate::ast::SelectionSet;
use crate::json_ext::Object;
use crate::schema::ObjectType;
use crate::schema::Schema;

/// The grouped field set of one output level: response key → merged field
/// nodes, in document order. Recursive collection over the merged nodes'
/// child selection sets sees the union of their subtrees.
pub(crate) type GroupedFieldSet<'a> = IndexMap<&'a str, Vec<&'a ast::Field>>;

/// Collect the grouped field set for `object_type` out of the merged
/// selection sets of one output level.
pub(crate) fn collect_fields<'a>(
    schema: &Schema,
    document: &'a Document,
    variables: &Object,
    object_type: &ObjectType,
    selection_sets: &[&'a SelectionSet],
) -> GroupedFieldSet<'a> {
    let mut grouped = GroupedFieldSet::default();
    for selection_set in selection_sets {
        // The fragment cycle guard is scoped to one collection pass: a
        // nested composite field starts over with a fresh set.
        let mut visited = HashSet::new();
        collect_into(
            schema,
            document,
            variables,
            object_type,
            selection_set,
            &mut visited,
            &mut grouped,
        );
    }
    grouped
}

fn collect_into<'a>(
    schema: &Schema,
    document: &'a Document,
    variables: &Object,
    object_type: &ObjectType,
    selection_set: &'a SelectionSet,
    visited: &mut HashSet<&'a str>,
    grouped: &mut GroupedFieldSet<'a>,
) {
    for selection in &selection_set.selections {
        match selection {
            Selection::Field(field) => {
                if IncludeSkip::parse(&field.directives).should_skip(variables) {
                    continue;
                }
                grouped.entry(field.response_key()).or_default().push(field);
            }
            Selection::FragmentSpread(spread) => {
                if IncludeSkip::parse(&spread.directives).should_skip(variables) {
                    continue;
                }
                if !visited.insert(spread.name.as_str()) {
                    continue;
                }
                let Some(fragment) = document.fragment(&spread.name) else {
                    // validation should have caught this; the spread
                    // contributes nothing
                    failfast_debug!("spread of an unknown fragment '{}'", spread.name);
                    continue;
                };
                if !type_condition_applies(
                    schema,
                    object_type,
                    Some(fragment.type_condition.as_str()),
                ) {
                    continue;
                }
                collect_into(
                    schema,
                    document,
                    variables,
                    object_type,
                    &fragment.selection_set,
                    visited,
                    grouped,
                );
            }
            Selection::InlineFragment(fragment) => {
                if IncludeSkip::parse(&fragment.directives).should_skip(variables) {
                    continue;
                }
                if !type_condition_applies(
                    schema,
                    object_type,
                    fragment.type_condition.as_deref(),
                ) {
                    continue;
                }
                collect_into(
                    schema,
                    document,
                    variables,
                    object_type,
                    &fragment.selection_set,
                    visited,
                    grouped,
                );
            }
        }
    }
}

/// Whether a fragment with the given type condition applies to the runtime
/// type currently being collected: exact match, or membership for
/// interfaces and unions. A mismatch excludes the fragment, it is not an
/// error.
fn type_condition_applies(
    schema: &Schema,
    object_type: &ObjectType,
    condition: Option<&str>,
) -> bool {
    match condition {
        None => true,
        Some(condition) => {
            condition == object_type.name() || schema.is_subtype(condition, object_type.name())
        }
    }
}

/// The `@skip`/`@include` state of one selection.
///
/// This is the single point where directive-based inclusion is decided, so
/// a future custom inclusion directive would hook in here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct IncludeSkip {
    include: Condition,
    skip: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Condition {
    Yes,
    No,
    Variable(String),
}

impl IncludeSkip {
    pub(crate) fn parse(directives: &[ast::Directive]) -> Self {
        let mut include = None;
        let mut skip = None;
        for directive in directives {
            if skip.is_none() && directive.name == "skip" {
                skip = Condition::parse(directive)
            }
            if include.is_none() && directive.name == "include" {
                include = Condition::parse(directive)
            }
        }
        Self {
            include: include.unwrap_or(Condition::Yes),
            skip: skip.unwrap_or(Condition::No),
        }
    }

    /// Skip is evaluated before include; an unresolvable variable falls
    /// back to keeping the selection, as validation has already checked
    /// variable presence and types.
    pub(crate) fn should_skip(&self, variables: &Object) -> bool {
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

impl Condition {
    pub(crate) fn parse(directive: &ast::Directive) -> Option<Self> {
        match directive.argument("if")? {
            ast::Value::Boolean(true) => Some(Condition::Yes),
            ast::Value::Boolean(false) => Some(Condition::No),
            ast::Value::Variable(name) => Some(Condition::Variable(name.clone())),
            _ => None,
        }
    }

    pub(crate) fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Yes => Some(true),
            Condition::No => Some(false),
            Condition::Variable(name) => variables.get(name.as_str()).and_then(|v| v.as_bool()),
        }
    }
}

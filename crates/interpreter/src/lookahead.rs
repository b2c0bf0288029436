// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashMap, sync::Arc};

use async_graphql_parser::{
    Positioned,
    types::{Directive, Field, FragmentDefinition, Selection, SelectionSet},
};
use async_graphql_value::{ConstValue, Name};
use indexmap::{IndexMap, IndexSet};

use crate::{
    arguments::{CoercionOutcome, coerce_arguments, flatten_arguments, flatten_value},
    context::QueryContext,
    gather::selection_directives,
    schema::Schema,
};

/// A read-only view of the selections below a field, used by resolvers to decide what to
/// fetch ahead of time.
///
/// Fragments are looked through regardless of their type condition. The `include`
/// predicates of `@skip`, `@include` and schema directives are honored, except for
/// directives with a `prepare` or `loads` argument: those depend on the object being
/// selected on, so their selections count as selected here.
#[derive(Clone)]
pub struct Lookahead<'r> {
    fields: Vec<&'r Positioned<Field>>,
    fragments: &'r HashMap<Name, Positioned<FragmentDefinition>>,
    schema: &'r Arc<Schema>,
    query: &'r Arc<QueryContext>,
}

impl<'r> Lookahead<'r> {
    pub(crate) fn new(
        fields: Vec<&'r Positioned<Field>>,
        fragments: &'r HashMap<Name, Positioned<FragmentDefinition>>,
        schema: &'r Arc<Schema>,
        query: &'r Arc<QueryContext>,
    ) -> Self {
        Self {
            fields,
            fragments,
            schema,
            query,
        }
    }

    /// Whether this view refers to at least one selected field.
    pub fn exists(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn selects(&self, name: &str) -> bool {
        self.selection(name).exists()
    }

    /// The sub-selections of the field `name` (by field name, not alias), merged across
    /// every place it was selected.
    pub fn selection(&self, name: &str) -> Lookahead<'r> {
        let mut fields = vec![];
        self.visit_children(&mut |field| {
            if field.node.name.node.as_str() == name {
                fields.push(field);
            }
        });
        Lookahead::new(fields, self.fragments, self.schema, self.query)
    }

    /// Names of the selected sub-fields, in document order.
    pub fn selection_names(&self) -> Vec<Name> {
        let mut names = IndexSet::new();
        self.visit_children(&mut |field| {
            names.insert(field.node.name.node.clone());
        });
        names.into_iter().collect()
    }

    /// Arguments of the first selection of this field, with variables substituted.
    pub fn arguments(&self) -> IndexMap<Name, ConstValue> {
        self.fields
            .first()
            .map(|field| {
                field
                    .node
                    .arguments
                    .iter()
                    .filter_map(|(name, value)| {
                        flatten_value(&value.node, self.query.variables())
                            .map(|value| (name.node.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn included(&self, directives: &[Positioned<Directive>]) -> bool {
        directives.iter().all(|directive| {
            let Some(definition) = self.schema.directive(&directive.node.name.node) else {
                return true;
            };
            let Some(include) = &definition.include else {
                return true;
            };
            if definition
                .arguments
                .values()
                .any(|argument| argument.prepare.is_some() || argument.loads.is_some())
            {
                return true;
            }

            let outcome = coerce_arguments(
                self.schema,
                &format!("@{}", definition.name),
                &definition.arguments,
                flatten_arguments(&directive.node.arguments, self.query.variables()),
                self.query,
            );
            match outcome {
                CoercionOutcome::Ready(Ok(arguments)) => include(&arguments, self.query),
                CoercionOutcome::Ready(Err(_)) => false,
                CoercionOutcome::Pending(_) => true,
            }
        })
    }

    fn visit_children(&self, visit: &mut dyn FnMut(&'r Positioned<Field>)) {
        for field in &self.fields {
            self.visit_selection_set(&field.node.selection_set.node, visit);
        }
    }

    fn visit_selection_set(
        &self,
        selection_set: &'r SelectionSet,
        visit: &mut dyn FnMut(&'r Positioned<Field>),
    ) {
        for selection in &selection_set.items {
            if !self.included(selection_directives(&selection.node)) {
                continue;
            }
            match &selection.node {
                Selection::Field(field) => visit(field),
                Selection::InlineFragment(fragment) => {
                    self.visit_selection_set(&fragment.node.selection_set.node, visit)
                }
                Selection::FragmentSpread(spread) => {
                    if let Some(fragment) = self.fragments.get(&spread.node.fragment_name.node) {
                        self.visit_selection_set(&fragment.node.selection_set.node, visit)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::{parse_query, types::DocumentOperations};

    use super::*;
    use crate::{
        dataloader::Dataloader,
        schema::{DirectiveDefinition, FieldDefinition, InputValueDefinition, ObjectType},
        trace::NoopTracer,
    };

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::build("Query")
                .register(ObjectType::new("Query").field(FieldDefinition::new("books", "Int")))
                .directive(
                    DirectiveDefinition::new("internal")
                        .argument(InputValueDefinition::new("hidden", "Boolean!"))
                        .include(|arguments, _| {
                            !matches!(arguments.get("hidden"), Some(ConstValue::Boolean(true)))
                        }),
                )
                .directive(
                    DirectiveDefinition::new("audited")
                        .argument(
                            InputValueDefinition::new("tag", "String")
                                .prepare(|value, _| Ok(value)),
                        )
                        .include(|_, _| false),
                )
                .finish()
                .unwrap(),
        )
    }

    #[test]
    fn looks_through_fragments_and_directives() {
        let document = parse_query(
            r#"
            query($skipTitle: Boolean!) {
                books(first: 10) {
                    id
                    title @skip(if: $skipTitle)
                    ... on Book { author { name } }
                    ...extra
                    secret @internal(hidden: true)
                    summary @internal(hidden: false)
                    audit @audited(tag: "x")
                }
            }
            fragment extra on Book { isbn author { born } }
            "#,
        )
        .unwrap();
        let DocumentOperations::Single(operation) = &document.operations else {
            panic!("expected a single operation");
        };
        let Selection::Field(books) = &operation.node.selection_set.node.items[0].node else {
            panic!("expected a field");
        };
        let schema = schema();
        let query = Arc::new(QueryContext::new(
            HashMap::new(),
            Arc::new(Dataloader::new(Arc::new(NoopTracer))),
            IndexMap::from([(Name::new("skipTitle"), ConstValue::Boolean(true))]),
            None,
        ));

        let lookahead = Lookahead::new(vec![books], &document.fragments, &schema, &query);

        let names: Vec<_> = lookahead
            .selection_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["id", "author", "isbn", "summary", "audit"]);
        assert!(!lookahead.selects("title"));
        assert!(!lookahead.selects("secret"));
        assert_eq!(
            lookahead.selection("author").selection_names(),
            vec![Name::new("name"), Name::new("born")]
        );
        assert_eq!(
            lookahead.arguments().get("first"),
            Some(&ConstValue::Number(10.into()))
        );
    }
}

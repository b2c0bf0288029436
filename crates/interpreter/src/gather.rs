// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Selection gathering: flattening the selection sets that apply to one object into an
//! ordered map from response key to the field nodes selecting it.

use std::{collections::HashMap, ops::ControlFlow, sync::Arc};

use async_graphql_parser::{
    Positioned,
    types::{Directive, Field, FragmentDefinition, Selection, SelectionSet},
};
use async_graphql_value::Name;
use futures::future::BoxFuture;
use indexmap::{IndexMap, map::Entry};
use tracing::trace;

use crate::{
    arguments::{
        ArgumentError, ArgumentsCache, ArgumentsKey, ArgumentsLookup, ArgumentsResult,
        coerce_arguments, flatten_arguments,
    },
    context::QueryContext,
    error::{ExecutionError, ExecutorError, PathSegment},
    runtime::rescue,
    schema::{DirectiveDefinition, Schema},
};

/// Every field node selecting one response key, in document order.
#[derive(Debug, Clone)]
pub(crate) enum FieldNodes<'a> {
    One(&'a Positioned<Field>),
    Many(Vec<&'a Positioned<Field>>),
}

impl<'a> FieldNodes<'a> {
    fn push(&mut self, field: &'a Positioned<Field>) {
        match self {
            FieldNodes::One(first) => *self = FieldNodes::Many(vec![*first, field]),
            FieldNodes::Many(fields) => fields.push(field),
        }
    }

    pub(crate) fn first(&self) -> &'a Positioned<Field> {
        match self {
            FieldNodes::One(field) => field,
            FieldNodes::Many(fields) => fields[0],
        }
    }

    pub(crate) fn to_vec(&self) -> Vec<&'a Positioned<Field>> {
        match self {
            FieldNodes::One(field) => vec![*field],
            FieldNodes::Many(fields) => fields.clone(),
        }
    }
}

pub(crate) type GatheredSelections<'a> = IndexMap<Name, FieldNodes<'a>>;

pub(crate) enum Gathered<'a> {
    Complete(GatheredSelections<'a>),
    /// A directive's arguments are still loading. Once they are stored in the cache,
    /// gathering starts over and finds them ready.
    Pending(ArgumentsKey, BoxFuture<'static, ArgumentsResult>),
}

type Suspend = (ArgumentsKey, BoxFuture<'static, ArgumentsResult>);

enum Inclusion {
    Included,
    Excluded,
    Pending(Suspend),
}

pub(crate) fn selection_directives(selection: &Selection) -> &[Positioned<Directive>] {
    match selection {
        Selection::Field(field) => &field.node.directives,
        Selection::FragmentSpread(spread) => &spread.node.directives,
        Selection::InlineFragment(fragment) => &fragment.node.directives,
    }
}

/// Gathers the selections of one object.
pub(crate) struct Gatherer<'a, 'g> {
    pub(crate) schema: &'a Arc<Schema>,
    pub(crate) fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    pub(crate) query: &'g Arc<QueryContext>,
    pub(crate) arguments: &'g mut ArgumentsCache,
    pub(crate) errors: &'g mut Vec<ExecutionError>,
    /// The concrete type of the object; type conditions are checked against it.
    pub(crate) owner_type: &'g Name,
    pub(crate) owner_identity: usize,
    pub(crate) path: &'g [PathSegment],
}

impl<'a> Gatherer<'a, '_> {
    pub(crate) fn gather(
        mut self,
        selection_sets: &[&'a SelectionSet],
    ) -> Result<Gathered<'a>, ExecutorError> {
        let mut gathered = IndexMap::new();
        for selection_set in selection_sets {
            if let ControlFlow::Break((key, future)) =
                self.gather_selection_set(selection_set, &mut gathered)?
            {
                return Ok(Gathered::Pending(key, future));
            }
        }
        Ok(Gathered::Complete(gathered))
    }

    fn gather_selection_set(
        &mut self,
        selection_set: &'a SelectionSet,
        gathered: &mut GatheredSelections<'a>,
    ) -> Result<ControlFlow<Suspend>, ExecutorError> {
        for selection in &selection_set.items {
            match self.included(selection_directives(&selection.node))? {
                Inclusion::Included => {}
                Inclusion::Excluded => continue,
                Inclusion::Pending(suspend) => return Ok(ControlFlow::Break(suspend)),
            }

            match &selection.node {
                Selection::Field(field) => {
                    match gathered.entry(field.node.response_key().node.clone()) {
                        Entry::Occupied(mut entry) => entry.get_mut().push(field),
                        Entry::Vacant(entry) => {
                            entry.insert(FieldNodes::One(field));
                        }
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let condition = fragment
                        .node
                        .type_condition
                        .as_ref()
                        .map(|condition| &condition.node.on.node);
                    if self.satisfies(condition) {
                        let flow =
                            self.gather_selection_set(&fragment.node.selection_set.node, gathered)?;
                        if flow.is_break() {
                            return Ok(flow);
                        }
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let Some(fragment) = self.fragments.get(&spread.node.fragment_name.node)
                    else {
                        continue;
                    };
                    if self.satisfies(Some(&fragment.node.type_condition.node.on.node)) {
                        let flow =
                            self.gather_selection_set(&fragment.node.selection_set.node, gathered)?;
                        if flow.is_break() {
                            return Ok(flow);
                        }
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn satisfies(&self, condition: Option<&Name>) -> bool {
        let satisfied = condition
            .is_none_or(|condition| self.schema.is_possible_type(condition, self.owner_type));
        if !satisfied {
            trace!(owner_type = %self.owner_type, ?condition, "type condition not satisfied");
        }
        satisfied
    }

    /// Run the `include` predicate of every directive on a node. Gathering suspends on the
    /// first directive whose arguments are still loading.
    fn included(
        &mut self,
        directives: &'a [Positioned<Directive>],
    ) -> Result<Inclusion, ExecutorError> {
        for directive in directives {
            let Some(definition) = self.schema.directive(&directive.node.name.node) else {
                continue;
            };
            let Some(include) = &definition.include else {
                continue;
            };

            let (key, lookup) = self.directive_arguments(directive, definition);
            match lookup {
                ArgumentsLookup::Ready(Ok(arguments)) => {
                    if !include(&arguments, self.query) {
                        return Ok(Inclusion::Excluded);
                    }
                }
                ArgumentsLookup::Ready(Err(error)) => {
                    let mut error = self.argument_error(error)?;
                    error.attach(|| self.path.to_vec(), directive.pos);
                    self.errors.push(error);
                    return Ok(Inclusion::Excluded);
                }
                ArgumentsLookup::Pending(future) => {
                    trace!(directive = %definition.name, "gathering waits on directive arguments");
                    return Ok(Inclusion::Pending((key, future)));
                }
            }
        }
        Ok(Inclusion::Included)
    }

    fn directive_arguments(
        &mut self,
        directive: &'a Positioned<Directive>,
        definition: &'a DirectiveDefinition,
    ) -> (ArgumentsKey, ArgumentsLookup) {
        let parent = definition
            .arguments
            .values()
            .any(|argument| argument.loads.is_some())
            .then_some(self.owner_identity);
        let key = ArgumentsKey::new(&directive.node, definition, parent);
        let (schema, query) = (self.schema, self.query);

        let lookup = self.arguments.dataload_for(key, || {
            coerce_arguments(
                schema,
                &format!("@{}", definition.name),
                &definition.arguments,
                flatten_arguments(&directive.node.arguments, query.variables()),
                query,
            )
        });
        (key, lookup)
    }

    fn argument_error(&self, error: ArgumentError) -> Result<ExecutionError, ExecutorError> {
        match error {
            ArgumentError::Execution(error) => Ok(error),
            ArgumentError::Unauthorized(error) => Ok(ExecutionError::new(error.to_string())),
            ArgumentError::Unexpected(error) => rescue(self.schema, error, self.path, self.query),
        }
    }
}

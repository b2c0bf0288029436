// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_graphql_parser::types::SelectionSet;
use async_graphql_value::{ConstValue, Name};
use futures::{FutureExt, future::BoxFuture};
use tracing::trace;

use crate::{
    error::{ExecutorError, PathSegment, ResolverError, UnauthorizedError},
    gather::{Gathered, Gatherer},
    result::ResultId,
    lazy::MaybeLazy,
    schema::{MetaType, ObjectType},
    value::{AppValue, FieldResult, ResolvedValue},
};

use super::{
    FieldStep, Parked, Position, Resumption, Runtime, StepOutcome, continuation::complete,
    identity, unexpected_resumption,
};

enum Target<'a> {
    Root,
    Child(Position<'a>),
}

enum ObjectState<'a> {
    ResolveType(&'a MetaType),
    AwaitingType(&'a MetaType),
    TypeResolved(&'a MetaType, Result<Name, ResolverError>),
    Authorize(&'a ObjectType),
    AwaitingAuthorization(&'a ObjectType),
    Authorized(&'a ObjectType, Result<bool, ResolverError>),
    /// The value was replaced (after failing authorization) by something still loading.
    AwaitingReplacement,
    Replaced(FieldResult),
    RunSelections(&'a ObjectType),
    Gather(&'a ObjectType, ResultId),
    /// Gathering stopped on a directive whose arguments are still loading.
    AwaitingDirectiveArguments(&'a ObjectType, ResultId),
    Done,
}

/// Turns an application value at a composite position into an object result: finds its
/// concrete type, authorizes it, then gathers its selections into field steps.
pub(crate) struct ObjectStep<'a> {
    target: Target<'a>,
    value: Arc<AppValue>,
    selections: Vec<&'a SelectionSet>,
    /// Root mutation fields run one at a time.
    eager: bool,
    state: ObjectState<'a>,
}

impl<'a> ObjectStep<'a> {
    pub(crate) fn root(
        root_type: &'a ObjectType,
        value: Arc<AppValue>,
        selection_set: &'a SelectionSet,
        eager: bool,
    ) -> Self {
        Self {
            target: Target::Root,
            value,
            selections: vec![selection_set],
            eager,
            state: ObjectState::Authorize(root_type),
        }
    }

    pub(crate) fn child(position: Position<'a>, static_type: &'a MetaType, value: AppValue) -> Self {
        let state = match static_type {
            MetaType::Object(object_type) => ObjectState::Authorize(object_type),
            _ => ObjectState::ResolveType(static_type),
        };
        Self {
            selections: position.frame.selections.clone(),
            target: Target::Child(position),
            value: Arc::new(value),
            eager: false,
            state,
        }
    }

    fn depth(&self, rt: &Runtime<'a>) -> usize {
        match &self.target {
            Target::Root => 0,
            Target::Child(position) => rt.tree.depth(position.parent) + 1,
        }
    }

    fn path(&self, rt: &Runtime<'a>) -> Vec<PathSegment> {
        match &self.target {
            Target::Root => vec![],
            Target::Child(position) => position.path(&rt.tree),
        }
    }

    pub(crate) fn run(mut self, rt: &mut Runtime<'a>) -> Result<StepOutcome<'a>, ExecutorError> {
        loop {
            if let Target::Child(position) = &self.target
                && rt.tree.is_dead(position.parent)
            {
                return Ok(StepOutcome::Finished);
            }

            match std::mem::replace(&mut self.state, ObjectState::Done) {
                ObjectState::ResolveType(abstract_type) => {
                    rt.tracer.begin_resolve_type(abstract_type.name());
                    match rt.schema.resolve_type(abstract_type, &self.value, &rt.context) {
                        Some(MaybeLazy::Ready(name)) => {
                            self.state = ObjectState::TypeResolved(abstract_type, Ok(name));
                        }
                        Some(MaybeLazy::Lazy(lazy)) => {
                            self.state = ObjectState::AwaitingType(abstract_type);
                            let depth = self.depth(rt);
                            let future = lazy.into_future().map(Resumption::Type).boxed();
                            return Ok(Parked::new(self, depth, future));
                        }
                        None => {
                            rt.tracer.end_resolve_type(abstract_type.name(), None);
                            return Err(ExecutorError::UnresolvedType {
                                abstract_type: abstract_type.name().clone(),
                                resolved: "no type".to_string(),
                            });
                        }
                    }
                }
                ObjectState::TypeResolved(abstract_type, result) => {
                    let name = match result {
                        Ok(name) => name,
                        Err(error) => {
                            rt.tracer.end_resolve_type(abstract_type.name(), None);
                            let value = rt.settle(Err(error), || self.path(rt))?;
                            return self.fail(rt, value);
                        }
                    };
                    rt.tracer
                        .end_resolve_type(abstract_type.name(), Some(name.as_str()));

                    let schema = rt.schema;
                    let object_type = schema
                        .object_type(&name)
                        .filter(|object_type| {
                            schema.is_possible_type(abstract_type.name(), object_type.name())
                        })
                        .ok_or_else(|| ExecutorError::UnresolvedType {
                            abstract_type: abstract_type.name().clone(),
                            resolved: name.to_string(),
                        })?;
                    self.state = ObjectState::Authorize(object_type);
                }
                ObjectState::Authorize(object_type) => match &object_type.authorize {
                    None => self.state = ObjectState::RunSelections(object_type),
                    Some(authorize) => {
                        rt.tracer.begin_authorized(object_type.name());
                        match authorize(&self.value, &rt.context) {
                            MaybeLazy::Ready(allowed) => {
                                self.state = ObjectState::Authorized(object_type, Ok(allowed));
                            }
                            MaybeLazy::Lazy(lazy) => {
                                self.state = ObjectState::AwaitingAuthorization(object_type);
                                let depth = self.depth(rt);
                                let future = lazy.into_future().map(Resumption::Authorized).boxed();
                                return Ok(Parked::new(self, depth, future));
                            }
                        }
                    }
                },
                ObjectState::Authorized(object_type, result) => {
                    rt.tracer
                        .end_authorized(object_type.name(), result.as_ref().ok().copied());
                    match result {
                        Ok(true) => self.state = ObjectState::RunSelections(object_type),
                        Ok(false) => {
                            trace!(type_name = %object_type.name(), "object failed authorization");
                            let error = UnauthorizedError::Object {
                                type_name: object_type.name().clone(),
                            };
                            return self.fail(rt, ResolvedValue::Unauthorized(error));
                        }
                        Err(error) => {
                            let value = rt.settle(Err(error), || self.path(rt))?;
                            return self.fail(rt, value);
                        }
                    }
                }
                ObjectState::Replaced(result) => {
                    let value = rt.settle(result, || self.path(rt))?;
                    return self.fail(rt, value);
                }
                ObjectState::RunSelections(object_type) => {
                    let node = self.result_node(rt, object_type);
                    self.state = ObjectState::Gather(object_type, node);
                }
                ObjectState::Gather(object_type, node) => {
                    match self.gather(rt, object_type, node)? {
                        None => return Ok(StepOutcome::Finished),
                        Some(future) => {
                            self.state = ObjectState::AwaitingDirectiveArguments(object_type, node);
                            let depth = self.depth(rt);
                            return Ok(Parked::new(self, depth, future));
                        }
                    }
                }
                ObjectState::AwaitingType(_)
                | ObjectState::AwaitingAuthorization(_)
                | ObjectState::AwaitingDirectiveArguments(..)
                | ObjectState::AwaitingReplacement
                | ObjectState::Done => {
                    return Err(ExecutorError::Invariant(
                        "object step ran while parked".to_string(),
                    ));
                }
            }
        }
    }

    /// The value at this position did not become an object: write whatever it became
    /// instead.
    fn fail(
        mut self,
        rt: &mut Runtime<'a>,
        value: ResolvedValue,
    ) -> Result<StepOutcome<'a>, ExecutorError> {
        match &self.target {
            Target::Child(position) => match complete(rt, value, position)? {
                None => Ok(StepOutcome::Finished),
                Some(lazy) => {
                    self.state = ObjectState::AwaitingReplacement;
                    let depth = self.depth(rt);
                    let future = lazy.into_future().map(Resumption::Value).boxed();
                    Ok(Parked::new(self, depth, future))
                }
            },
            Target::Root => {
                match value {
                    ResolvedValue::Error(error) => rt.errors.push(error),
                    ResolvedValue::Lazy(_) => {
                        return Err(ExecutorError::Invariant(
                            "root value replaced by a lazy value".to_string(),
                        ));
                    }
                    ResolvedValue::Unauthorized(error) => {
                        match rt.schema.unauthorized(&error, &rt.context) {
                            Ok(ResolvedValue::Error(error)) | Err(error) => rt.errors.push(error),
                            Ok(_) => {}
                        }
                    }
                    _ => {}
                }
                rt.tree.null_data();
                Ok(StepOutcome::Finished)
            }
        }
    }

    fn result_node(&self, rt: &mut Runtime<'a>, object_type: &'a ObjectType) -> ResultId {
        match &self.target {
            Target::Root => rt.tree.root(),
            Target::Child(position) => {
                trace!(type_name = %object_type.name(), "allocating object result");
                rt.tree.new_object(
                    position.parent,
                    position.key.clone(),
                    self.value.clone(),
                    position.is_non_null(),
                )
            }
        }
    }

    /// Gather the selections of the object and enqueue a field step per response key, or
    /// hand back the directive arguments gathering has to wait for.
    fn gather(
        &self,
        rt: &mut Runtime<'a>,
        object_type: &'a ObjectType,
        node: ResultId,
    ) -> Result<Option<BoxFuture<'static, Resumption>>, ExecutorError> {
        let path = rt.tree.path(node);
        // Errors of a pass that suspends are dropped; the restarted pass finds them again.
        let mut errors = vec![];

        let gathered = Gatherer {
            schema: rt.schema,
            fragments: rt.request.fragments(),
            query: &rt.context,
            arguments: &mut rt.arguments,
            errors: &mut errors,
            owner_type: object_type.name(),
            owner_identity: identity(&self.value),
            path: &path,
        }
        .gather(&self.selections)?;

        let gathered = match gathered {
            Gathered::Complete(gathered) => gathered,
            Gathered::Pending(key, future) => {
                let future = future
                    .map(move |result| Resumption::Arguments(key, result))
                    .boxed();
                return Ok(Some(future));
            }
        };
        rt.errors.extend(errors);

        rt.tree
            .set_ordered_keys(node, gathered.keys().cloned().collect());

        for (key, nodes) in gathered {
            let field_name = &nodes.first().node.name.node;
            if field_name.as_str() == "__typename" {
                rt.tree.set_leaf(
                    node,
                    &PathSegment::Field(key),
                    ConstValue::String(object_type.name().to_string()),
                    false,
                );
                continue;
            }

            let field = object_type.field_definition(field_name).ok_or_else(|| {
                ExecutorError::UnknownField {
                    type_name: object_type.name().clone(),
                    field_name: field_name.clone(),
                }
            })?;
            let step = FieldStep::new(node, key, object_type, field, nodes, self.value.clone());
            if self.eager {
                rt.eager_fields.push_back(step.into());
            } else {
                rt.enqueue(step);
            }
        }
        Ok(None)
    }

    pub(crate) fn resume(mut self, resumption: Resumption) -> Result<Self, ExecutorError> {
        let state = std::mem::replace(&mut self.state, ObjectState::Done);
        self.state = match (state, resumption) {
            (ObjectState::AwaitingType(abstract_type), Resumption::Type(result)) => {
                ObjectState::TypeResolved(abstract_type, result)
            }
            (ObjectState::AwaitingAuthorization(object_type), Resumption::Authorized(result)) => {
                ObjectState::Authorized(object_type, result)
            }
            (ObjectState::AwaitingReplacement, Resumption::Value(result)) => {
                ObjectState::Replaced(result)
            }
            (
                ObjectState::AwaitingDirectiveArguments(object_type, node),
                Resumption::Arguments(..),
            ) => ObjectState::Gather(object_type, node),
            (_, other) => return Err(unexpected_resumption("object step", &other)),
        };
        Ok(self)
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use futures::{FutureExt, future::BoxFuture};
use tracing::trace;

use crate::{
    arguments::{
        Arguments, ArgumentsKey, ArgumentsLookup, ArgumentsResult, coerce_arguments,
        flatten_arguments,
    },
    context::{ErrorCollector, Extras, ResolverContext},
    error::{ExecutorError, PathSegment, UnauthorizedError},
    gather::FieldNodes,
    lookahead::Lookahead,
    result::ResultId,
    schema::{Extra, FieldDefinition, ObjectType},
    value::{AppValue, FieldResult, ResolvedValue},
};

use super::{
    FieldFrame, Parked, Position, Resumption, Runtime, StepOutcome, argument_failure,
    continuation::complete,
    directives::{CursorOutcome, DirectiveCursor, DirectiveHook},
    identity, unexpected_resumption,
};

enum FieldState<'a> {
    InspectAst,
    RunDirectives(DirectiveCursor<'a>),
    LoadArguments,
    AwaitingArguments,
    PrepareKwargArguments(ArgumentsResult),
    CallFieldResolver(Arc<Arguments>),
    HandleResolvedValue(FieldResult),
    AwaitingValue,
    Done,
}

/// Resolves one response key of one object.
pub(crate) struct FieldStep<'a> {
    node: ResultId,
    key: Name,
    nodes: FieldNodes<'a>,
    frame: Arc<FieldFrame<'a>>,
    state: FieldState<'a>,
}

impl<'a> FieldStep<'a> {
    pub(crate) fn new(
        node: ResultId,
        key: Name,
        owner_type: &'a ObjectType,
        field: &'a FieldDefinition,
        nodes: FieldNodes<'a>,
        object: Arc<AppValue>,
    ) -> Self {
        let frame = FieldFrame {
            owner_type,
            field,
            ast_node: nodes.first(),
            selections: vec![],
            directives: vec![],
            object,
        };
        Self {
            node,
            key,
            nodes,
            frame: Arc::new(frame),
            state: FieldState::InspectAst,
        }
    }

    fn segment(&self) -> PathSegment {
        PathSegment::Field(self.key.clone())
    }

    fn path(&self, rt: &Runtime<'a>) -> Vec<PathSegment> {
        rt.tree.path_to(self.node, &self.segment())
    }

    fn position(&self) -> Position<'a> {
        Position {
            parent: self.node,
            key: self.segment(),
            ty: &self.frame.field.ty,
            frame: self.frame.clone(),
        }
    }

    fn park(
        mut self,
        rt: &Runtime<'a>,
        state: FieldState<'a>,
        future: BoxFuture<'static, Resumption>,
    ) -> StepOutcome<'a> {
        trace!(key = %self.key, "field step parked");
        self.state = state;
        let depth = rt.tree.depth(self.node) + 1;
        Parked::new(self, depth, future)
    }

    pub(crate) fn run(mut self, rt: &mut Runtime<'a>) -> Result<StepOutcome<'a>, ExecutorError> {
        loop {
            if rt.tree.is_dead(self.node) {
                return Ok(StepOutcome::Finished);
            }

            match std::mem::replace(&mut self.state, FieldState::Done) {
                FieldState::InspectAst => {
                    self.inspect_ast();
                    self.state = if self.frame.directives.is_empty() {
                        FieldState::LoadArguments
                    } else {
                        FieldState::RunDirectives(DirectiveCursor::new(
                            rt,
                            &self.frame.directives,
                            DirectiveHook::Resolve,
                        ))
                    };
                }
                FieldState::RunDirectives(mut cursor) => {
                    let path = self.path(rt);
                    let object = self.frame.object.clone();
                    match cursor.advance(rt, &object, &path)? {
                        CursorOutcome::Continue => self.state = FieldState::LoadArguments,
                        CursorOutcome::Skip => {
                            rt.tree.skip(self.node, &self.segment());
                            return Ok(StepOutcome::Finished);
                        }
                        CursorOutcome::Failed(error) => {
                            self.state = FieldState::HandleResolvedValue(Err(error));
                        }
                        CursorOutcome::ArgumentsFailed(error) => {
                            self.state = FieldState::HandleResolvedValue(argument_failure(error));
                        }
                        CursorOutcome::Park(future) => {
                            return Ok(self.park(rt, FieldState::RunDirectives(cursor), future));
                        }
                    }
                }
                FieldState::LoadArguments => match self.load_arguments(rt) {
                    ArgumentsLookup::Ready(result) => {
                        self.state = FieldState::PrepareKwargArguments(result);
                    }
                    ArgumentsLookup::Pending(future) => {
                        let future = future_of(future, self.arguments_key());
                        return Ok(self.park(rt, FieldState::AwaitingArguments, future));
                    }
                },
                FieldState::PrepareKwargArguments(result) => {
                    self.state = match result {
                        Ok(arguments) => FieldState::CallFieldResolver(arguments),
                        Err(error) => FieldState::HandleResolvedValue(argument_failure(error)),
                    };
                }
                FieldState::CallFieldResolver(arguments) => {
                    let result = self.call_field_resolver(rt, &arguments);
                    self.state = FieldState::HandleResolvedValue(result);
                }
                FieldState::HandleResolvedValue(result) => {
                    let value = rt.settle(result, || self.path(rt))?;
                    match complete(rt, value, &self.position())? {
                        None => return Ok(StepOutcome::Finished),
                        Some(lazy) => {
                            let future = lazy.into_future().map(Resumption::Value).boxed();
                            return Ok(self.park(rt, FieldState::AwaitingValue, future));
                        }
                    }
                }
                FieldState::AwaitingArguments | FieldState::AwaitingValue | FieldState::Done => {
                    return Err(ExecutorError::Invariant(
                        "field step ran while parked".to_string(),
                    ));
                }
            }
        }
    }

    /// Merge the selection sets and directives of every node selecting this key.
    fn inspect_ast(&mut self) {
        let nodes = self.nodes.to_vec();
        let frame = FieldFrame {
            owner_type: self.frame.owner_type,
            field: self.frame.field,
            ast_node: self.frame.ast_node,
            selections: nodes
                .clone()
                .into_iter()
                .map(|node| &node.node.selection_set.node)
                .collect(),
            directives: nodes
                .into_iter()
                .flat_map(|node| node.node.directives.iter())
                .collect(),
            object: self.frame.object.clone(),
        };
        self.frame = Arc::new(frame);
    }

    /// Arguments owned by a field whose arguments never load objects coerce the same way
    /// for every parent, so the parent is left out of their cache key.
    fn arguments_key(&self) -> ArgumentsKey {
        let field = self.frame.field;
        let parent = field
            .arguments
            .values()
            .any(|argument| argument.loads.is_some())
            .then(|| identity(&self.frame.object));
        ArgumentsKey::new(self.nodes.first(), field, parent)
    }

    fn load_arguments(&self, rt: &mut Runtime<'a>) -> ArgumentsLookup {
        let field = self.frame.field;
        if field.arguments.is_empty() {
            return ArgumentsLookup::Ready(Ok(Arguments::empty()));
        }

        let key = self.arguments_key();
        let owner = format!("{}.{}", self.frame.owner_type.name(), field.name());
        let ast_arguments = &self.nodes.first().node.arguments;
        let (schema, context) = (rt.schema, &rt.context);

        rt.arguments.dataload_for(key, || {
            coerce_arguments(
                schema,
                &owner,
                &field.arguments,
                flatten_arguments(ast_arguments, context.variables()),
                context,
            )
        })
    }

    fn call_field_resolver(&self, rt: &mut Runtime<'a>, arguments: &Arguments) -> FieldResult {
        let FieldFrame {
            owner_type,
            field,
            ast_node,
            ..
        } = *self.frame;
        let path = self.path(rt);
        let collector = field
            .wants(&Extra::ExecutionErrors)
            .then(ErrorCollector::default);

        let result = {
            let mut extras = Extras {
                errors: collector.as_ref(),
                ..Extras::default()
            };
            if field.wants(&Extra::AstNode) {
                extras.ast_node = Some(ast_node);
            }
            if field.wants(&Extra::Path) {
                extras.path = Some(path.as_slice());
            }
            if field.wants(&Extra::Lookahead) {
                extras.lookahead = Some(Lookahead::new(
                    self.nodes.to_vec(),
                    rt.request.fragments(),
                    rt.schema,
                    &rt.context,
                ));
            }
            if field.wants(&Extra::Parent) {
                extras.parent = rt.tree.parent_value(self.node).map(|parent| &**parent);
            }
            for extra in &field.extras {
                if let Extra::Custom(name) = extra {
                    let value = field
                        .extra_provider
                        .as_ref()
                        .map_or(ConstValue::Null, |provide| provide(name, &rt.context));
                    extras.custom.insert(name.clone(), value);
                }
            }

            let context = ResolverContext {
                object: &self.frame.object,
                arguments,
                query: &rt.context,
                type_name: owner_type.name(),
                field,
                extras,
            };

            let authorized = field
                .authorize
                .as_ref()
                .is_none_or(|authorize| authorize(&context));
            if authorized {
                rt.tracer
                    .begin_execute_field(owner_type.name(), field.name(), &path);
                let result = match &field.resolver {
                    Some(resolver) => resolver(&context),
                    None => default_resolve(&self.frame.object, field.name()),
                };
                rt.tracer
                    .end_execute_field(owner_type.name(), field.name(), &path);
                result
            } else {
                Ok(ResolvedValue::Unauthorized(UnauthorizedError::Field {
                    type_name: owner_type.name().clone(),
                    field_name: field.name().clone(),
                }))
            }
        };

        if let Some(collector) = collector {
            for mut error in collector.into_errors() {
                error.attach(|| path.clone(), ast_node.pos);
                rt.errors.push(error);
            }
        }
        result
    }

    pub(crate) fn resume(mut self, resumption: Resumption) -> Result<Self, ExecutorError> {
        let state = std::mem::replace(&mut self.state, FieldState::Done);
        self.state = match (state, resumption) {
            (FieldState::RunDirectives(mut cursor), resumption) => {
                cursor.resume(resumption)?;
                FieldState::RunDirectives(cursor)
            }
            (FieldState::AwaitingArguments, Resumption::Arguments(_, result)) => {
                FieldState::PrepareKwargArguments(result)
            }
            (FieldState::AwaitingValue, Resumption::Value(result)) => {
                FieldState::HandleResolvedValue(result)
            }
            (_, other) => return Err(unexpected_resumption("field step", &other)),
        };
        Ok(self)
    }
}

fn future_of(
    future: BoxFuture<'static, ArgumentsResult>,
    key: ArgumentsKey,
) -> BoxFuture<'static, Resumption> {
    future
        .map(move |result| Resumption::Arguments(key, result))
        .boxed()
}

/// Fields without a resolver read the same-named key of a data object.
fn default_resolve(object: &AppValue, name: &Name) -> FieldResult {
    let value = match object {
        AppValue::Data(ConstValue::Object(fields)) => {
            fields.get(name).cloned().unwrap_or(ConstValue::Null)
        }
        _ => ConstValue::Null,
    };
    Ok(ResolvedValue::Value(value))
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::VecDeque, sync::Arc};

use async_graphql_parser::{Positioned, types::Directive};
use futures::{FutureExt, future::BoxFuture};

use crate::{
    arguments::{
        ArgumentError, ArgumentsKey, ArgumentsLookup, ArgumentsResult, coerce_arguments,
        flatten_arguments,
    },
    error::{ExecutorError, PathSegment, ResolverError},
    lazy::MaybeLazy,
    schema::{DirectiveContext, DirectiveDefinition, DirectiveFlow, DirectiveResolveFn},
    value::AppValue,
};

use super::{Resumption, Runtime, identity, unexpected_resumption};

/// Which hook of a runtime directive to run.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DirectiveHook {
    /// Around the annotated field.
    Resolve,
    /// Around each item of the annotated list field.
    ResolveEach,
}

impl DirectiveHook {
    fn of(self, definition: &DirectiveDefinition) -> Option<&DirectiveResolveFn> {
        match self {
            DirectiveHook::Resolve => definition.resolve.as_ref(),
            DirectiveHook::ResolveEach => definition.resolve_each.as_ref(),
        }
    }
}

pub(crate) enum CursorOutcome {
    /// Every directive let resolution carry on.
    Continue,
    Skip,
    Failed(ResolverError),
    ArgumentsFailed(ArgumentError),
    Park(BoxFuture<'static, Resumption>),
}

/// Walks the runtime directives on a position one at a time, parking whenever a
/// directive's arguments or its hook's answer is not ready yet.
pub(crate) struct DirectiveCursor<'a> {
    hook: DirectiveHook,
    pending: VecDeque<(&'a Positioned<Directive>, &'a DirectiveDefinition)>,
    arguments: Option<ArgumentsResult>,
    flow: Option<Result<DirectiveFlow, ResolverError>>,
}

impl<'a> DirectiveCursor<'a> {
    pub(crate) fn new(
        rt: &Runtime<'a>,
        directives: &[&'a Positioned<Directive>],
        hook: DirectiveHook,
    ) -> Self {
        let schema = rt.schema;
        let pending = directives
            .iter()
            .filter_map(|directive| {
                schema
                    .directive(&directive.node.name.node)
                    .filter(|definition| hook.of(definition).is_some())
                    .map(|definition| (*directive, definition))
            })
            .collect();

        Self {
            hook,
            pending,
            arguments: None,
            flow: None,
        }
    }

    pub(crate) fn advance(
        &mut self,
        rt: &mut Runtime<'a>,
        object: &Arc<AppValue>,
        path: &[PathSegment],
    ) -> Result<CursorOutcome, ExecutorError> {
        loop {
            let Some(&(directive, definition)) = self.pending.front() else {
                return Ok(CursorOutcome::Continue);
            };

            if let Some(flow) = self.flow.take() {
                self.pending.pop_front();
                self.arguments = None;
                match flow {
                    Ok(DirectiveFlow::Continue) => continue,
                    Ok(DirectiveFlow::Skip) => return Ok(CursorOutcome::Skip),
                    Err(error) => return Ok(CursorOutcome::Failed(error)),
                }
            }

            let arguments = match self.arguments.clone() {
                Some(arguments) => arguments,
                None => {
                    let parent = definition
                        .arguments
                        .values()
                        .any(|argument| argument.loads.is_some())
                        .then(|| identity(object));
                    let key = ArgumentsKey::new(&directive.node, definition, parent);
                    let (schema, context) = (rt.schema, &rt.context);

                    let lookup = rt.arguments.dataload_for(key, || {
                        coerce_arguments(
                            schema,
                            &format!("@{}", definition.name),
                            &definition.arguments,
                            flatten_arguments(&directive.node.arguments, context.variables()),
                            context,
                        )
                    });
                    match lookup {
                        ArgumentsLookup::Ready(arguments) => {
                            self.arguments = Some(arguments.clone());
                            arguments
                        }
                        ArgumentsLookup::Pending(future) => {
                            return Ok(CursorOutcome::Park(
                                future
                                    .map(move |result| Resumption::Arguments(key, result))
                                    .boxed(),
                            ));
                        }
                    }
                }
            };

            let arguments = match arguments {
                Ok(arguments) => arguments,
                Err(error) => {
                    self.pending.pop_front();
                    self.arguments = None;
                    return Ok(CursorOutcome::ArgumentsFailed(error));
                }
            };

            let Some(hook) = self.hook.of(definition) else {
                self.flow = Some(Ok(DirectiveFlow::Continue));
                continue;
            };
            let context = DirectiveContext {
                arguments: &arguments,
                object,
                path,
                query: &rt.context,
            };
            match hook(&context) {
                Ok(MaybeLazy::Ready(flow)) => self.flow = Some(Ok(flow)),
                Ok(MaybeLazy::Lazy(lazy)) => {
                    return Ok(CursorOutcome::Park(
                        lazy.into_future().map(Resumption::Directive).boxed(),
                    ));
                }
                Err(error) => self.flow = Some(Err(ResolverError::Execution(error))),
            }
        }
    }

    pub(crate) fn resume(&mut self, resumption: Resumption) -> Result<(), ExecutorError> {
        match resumption {
            Resumption::Arguments(_, result) => self.arguments = Some(result),
            Resumption::Directive(flow) => self.flow = Some(flow),
            other => return Err(unexpected_resumption("directive", &other)),
        }
        Ok(())
    }
}

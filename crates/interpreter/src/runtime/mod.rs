// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The per-query runtime.
//!
//! Work is broken into steps ([`ObjectStep`], [`FieldStep`], [`ListItemStep`]), each an
//! explicit state machine. Running a step either finishes it (possibly enqueuing more steps)
//! or parks it on a future. The [`Scheduler`] drains ready steps, then awaits parked
//! futures shallowest depth first and hands each result back to its step.

mod continuation;
mod directives;
mod field_step;
mod list_item_step;
mod object_step;
mod scheduler;

use std::{collections::VecDeque, sync::Arc};

use async_graphql_parser::{
    Positioned,
    types::{Directive, Field, SelectionSet},
};
use futures::future::BoxFuture;

pub(crate) use field_step::FieldStep;
pub(crate) use list_item_step::ListItemStep;
pub(crate) use object_step::ObjectStep;
pub(crate) use scheduler::Scheduler;

use crate::{
    arguments::{ArgumentError, ArgumentsCache, ArgumentsKey, ArgumentsResult},
    context::QueryContext,
    error::{ExecutionError, ExecutorError, PathSegment, ResolverError, SharedError, format_path},
    request::PreparedRequest,
    result::{ResultId, ResultTree},
    schema::{DirectiveFlow, ErrorContext, FieldDefinition, ObjectType, Schema, TypeRef},
    trace::Tracer,
    value::{AppValue, FieldResult, ResolvedValue},
};

/// Everything one query needs while it runs.
pub(crate) struct Runtime<'a> {
    pub(crate) schema: &'a Arc<Schema>,
    pub(crate) request: &'a PreparedRequest,
    pub(crate) context: Arc<QueryContext>,
    pub(crate) tracer: Arc<dyn Tracer>,
    pub(crate) tree: ResultTree,
    pub(crate) errors: Vec<ExecutionError>,
    pub(crate) arguments: ArgumentsCache,
    pub(crate) queue: VecDeque<Step<'a>>,
    /// Root mutation fields, released one at a time once everything else has settled.
    pub(crate) eager_fields: VecDeque<Step<'a>>,
    pub(crate) parked: usize,
}

impl<'a> Runtime<'a> {
    pub(crate) fn new(
        schema: &'a Arc<Schema>,
        request: &'a PreparedRequest,
        tracer: Arc<dyn Tracer>,
    ) -> Result<Self, ExecutorError> {
        let root_type = schema
            .root_type(request.operation().ty)
            .ok_or_else(|| {
                ExecutorError::Invariant(format!(
                    "no root type for {:?} operations",
                    request.operation().ty
                ))
            })?;
        let root_value = request.root_value().clone();

        let mut runtime = Self {
            schema,
            request,
            context: request.context().clone(),
            tracer,
            tree: ResultTree::new(root_value.clone()),
            errors: vec![],
            arguments: ArgumentsCache::default(),
            queue: VecDeque::new(),
            eager_fields: VecDeque::new(),
            parked: 0,
        };

        let eager = request.is_mutation();
        runtime.queue.push_back(Step::Object(ObjectStep::root(
            root_type,
            root_value,
            &request.operation().selection_set.node,
            eager,
        )));
        Ok(runtime)
    }

    /// Settle a resolver outcome into a value continuation can act on. Unexpected errors
    /// go through the rescue hook and abort the query when it declines them.
    pub(crate) fn settle(
        &self,
        result: FieldResult,
        path: impl FnOnce() -> Vec<PathSegment>,
    ) -> Result<ResolvedValue, ExecutorError> {
        match result {
            Ok(value) => Ok(value),
            Err(ResolverError::Execution(error)) => Ok(ResolvedValue::Error(error)),
            Err(ResolverError::Unexpected(error)) => {
                rescue(self.schema, error, &path(), &self.context).map(ResolvedValue::Error)
            }
        }
    }

    pub(crate) fn enqueue(&mut self, step: impl Into<Step<'a>>) {
        self.queue.push_back(step.into());
    }

    pub(crate) fn response_errors(&mut self) -> Vec<ExecutionError> {
        std::mem::take(&mut self.errors)
    }
}

/// Offer an unexpected error to the schema's rescue hook.
pub(crate) fn rescue(
    schema: &Schema,
    error: SharedError,
    path: &[PathSegment],
    query: &QueryContext,
) -> Result<ExecutionError, ExecutorError> {
    let context = ErrorContext { path, query };
    schema
        .rescue(&error, &context)
        .ok_or_else(|| ExecutorError::Unhandled {
            path: format_path(path),
            error,
        })
}

/// How a failed argument bag surfaces at the position it was needed for.
pub(crate) fn argument_failure(error: ArgumentError) -> FieldResult {
    match error {
        ArgumentError::Execution(error) => Ok(ResolvedValue::Error(error)),
        ArgumentError::Unauthorized(error) => Ok(ResolvedValue::Unauthorized(error)),
        ArgumentError::Unexpected(error) => Err(ResolverError::Unexpected(error)),
    }
}

/// The identity of an application value, for argument cache keys.
pub(crate) fn identity(value: &Arc<AppValue>) -> usize {
    match value.as_ref() {
        AppValue::Object(object) => object.identity(),
        AppValue::Data(_) => Arc::as_ptr(value) as usize,
    }
}

/// What a field step learned from the AST, shared with the list items below it.
pub(crate) struct FieldFrame<'a> {
    pub(crate) owner_type: &'a ObjectType,
    pub(crate) field: &'a FieldDefinition,
    pub(crate) ast_node: &'a Positioned<Field>,
    pub(crate) selections: Vec<&'a SelectionSet>,
    pub(crate) directives: Vec<&'a Positioned<Directive>>,
    /// The object owning the field.
    pub(crate) object: Arc<AppValue>,
}

/// A result position a value is about to be written to.
#[derive(Clone)]
pub(crate) struct Position<'a> {
    pub(crate) parent: ResultId,
    pub(crate) key: PathSegment,
    /// The declared type at this position, including any non-null wrapper.
    pub(crate) ty: &'a TypeRef,
    pub(crate) frame: Arc<FieldFrame<'a>>,
}

impl Position<'_> {
    pub(crate) fn is_non_null(&self) -> bool {
        self.ty.is_non_null()
    }

    pub(crate) fn path(&self, tree: &ResultTree) -> Vec<PathSegment> {
        tree.path_to(self.parent, &self.key)
    }
}

pub(crate) enum Step<'a> {
    Object(ObjectStep<'a>),
    Field(FieldStep<'a>),
    ListItem(ListItemStep<'a>),
}

impl<'a> Step<'a> {
    pub(crate) fn run(self, rt: &mut Runtime<'a>) -> Result<StepOutcome<'a>, ExecutorError> {
        match self {
            Step::Object(step) => step.run(rt),
            Step::Field(step) => step.run(rt),
            Step::ListItem(step) => step.run(rt),
        }
    }

    pub(crate) fn resume(self, resumption: Resumption) -> Result<Step<'a>, ExecutorError> {
        match self {
            Step::Object(step) => step.resume(resumption).map(Step::Object),
            Step::Field(step) => step.resume(resumption).map(Step::Field),
            Step::ListItem(step) => step.resume(resumption).map(Step::ListItem),
        }
    }
}

impl<'a> From<ObjectStep<'a>> for Step<'a> {
    fn from(step: ObjectStep<'a>) -> Self {
        Step::Object(step)
    }
}

impl<'a> From<FieldStep<'a>> for Step<'a> {
    fn from(step: FieldStep<'a>) -> Self {
        Step::Field(step)
    }
}

impl<'a> From<ListItemStep<'a>> for Step<'a> {
    fn from(step: ListItemStep<'a>) -> Self {
        Step::ListItem(step)
    }
}

pub(crate) enum StepOutcome<'a> {
    Finished,
    Parked(Parked<'a>),
}

/// A step waiting on a future, filed under the depth of the position it works on.
pub(crate) struct Parked<'a> {
    pub(crate) step: Step<'a>,
    pub(crate) depth: usize,
    pub(crate) future: BoxFuture<'static, Resumption>,
}

impl<'a> Parked<'a> {
    pub(crate) fn new(
        step: impl Into<Step<'a>>,
        depth: usize,
        future: BoxFuture<'static, Resumption>,
    ) -> StepOutcome<'a> {
        StepOutcome::Parked(Parked {
            step: step.into(),
            depth,
            future,
        })
    }
}

/// The outcome of the future a step was parked on.
pub(crate) enum Resumption {
    Value(FieldResult),
    Arguments(ArgumentsKey, ArgumentsResult),
    Type(Result<async_graphql_value::Name, ResolverError>),
    Authorized(Result<bool, ResolverError>),
    Directive(Result<DirectiveFlow, ResolverError>),
}

impl Resumption {
    fn kind(&self) -> &'static str {
        match self {
            Resumption::Value(_) => "value",
            Resumption::Arguments(..) => "arguments",
            Resumption::Type(_) => "type",
            Resumption::Authorized(_) => "authorization",
            Resumption::Directive(_) => "directive",
        }
    }
}

pub(crate) fn unexpected_resumption(step: &str, resumption: &Resumption) -> ExecutorError {
    ExecutorError::Invariant(format!(
        "{step} resumed with a {} result it was not waiting for",
        resumption.kind()
    ))
}

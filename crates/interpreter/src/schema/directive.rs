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
use indexmap::IndexMap;

use crate::{
    arguments::Arguments,
    context::QueryContext,
    error::{ExecutionError, PathSegment},
    lazy::MaybeLazy,
    value::AppValue,
};

use super::types::InputValueDefinition;

pub type IncludeFn = Arc<dyn Fn(&Arguments, &QueryContext) -> bool + Send + Sync>;
pub type DirectiveResolveFn = Arc<
    dyn for<'r> Fn(&DirectiveContext<'r>) -> Result<MaybeLazy<DirectiveFlow>, ExecutionError>
        + Send
        + Sync,
>;

/// Whether a runtime directive lets resolution carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveFlow {
    Continue,
    /// Leave the position out of the response.
    Skip,
}

/// What a runtime directive's `resolve`/`resolve_each` hook gets to look at.
pub struct DirectiveContext<'r> {
    pub(crate) arguments: &'r Arguments,
    pub(crate) object: &'r AppValue,
    pub(crate) path: &'r [PathSegment],
    pub(crate) query: &'r QueryContext,
}

impl<'r> DirectiveContext<'r> {
    pub fn arguments(&self) -> &Arguments {
        self.arguments
    }

    /// The object owning the field the directive is attached to.
    pub fn object(&self) -> &AppValue {
        self.object
    }

    pub fn path(&self) -> &[PathSegment] {
        self.path
    }

    pub fn query(&self) -> &QueryContext {
        self.query
    }
}

pub struct DirectiveDefinition {
    pub(crate) name: Name,
    pub(crate) arguments: IndexMap<Name, InputValueDefinition>,
    pub(crate) include: Option<IncludeFn>,
    pub(crate) resolve: Option<DirectiveResolveFn>,
    pub(crate) resolve_each: Option<DirectiveResolveFn>,
}

impl DirectiveDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::new(name),
            arguments: IndexMap::new(),
            include: None,
            resolve: None,
            resolve_each: None,
        }
    }

    pub fn argument(mut self, argument: InputValueDefinition) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    /// Gate selection gathering: returning `false` drops the annotated node and its subtree.
    pub fn include(
        mut self,
        f: impl Fn(&Arguments, &QueryContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.include = Some(Arc::new(f));
        self
    }

    /// Run before the annotated field is resolved.
    pub fn resolve<F>(mut self, f: F) -> Self
    where
        F: for<'r> Fn(&DirectiveContext<'r>) -> Result<MaybeLazy<DirectiveFlow>, ExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.resolve = Some(Arc::new(f));
        self
    }

    /// Run before each item of the annotated list field is resolved.
    pub fn resolve_each<F>(mut self, f: F) -> Self
    where
        F: for<'r> Fn(&DirectiveContext<'r>) -> Result<MaybeLazy<DirectiveFlow>, ExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.resolve_each = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }
}

fn if_argument(arguments: &Arguments) -> bool {
    matches!(arguments.get("if"), Some(ConstValue::Boolean(true)))
}

pub(super) fn built_in_directives() -> Vec<DirectiveDefinition> {
    vec![
        DirectiveDefinition::new("skip")
            .argument(InputValueDefinition::new("if", "Boolean!"))
            .include(|arguments, _| !if_argument(arguments)),
        DirectiveDefinition::new("include")
            .argument(InputValueDefinition::new("if", "Boolean!"))
            .include(|arguments, _| if_argument(arguments)),
    ]
}

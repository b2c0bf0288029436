// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Argument coercion.
//!
//! AST arguments are flattened into a plain value bag (variables substituted), coerced
//! against their definitions, run through `prepare` hooks and finally loaded and authorized
//! when the definition `loads` an object. The result is frozen into an [`Arguments`] bag
//! cached per (AST node, argument owner, parent object).

mod cache;
mod coercion;
mod flatten;

use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

pub(crate) use cache::{ArgumentsCache, ArgumentsKey, ArgumentsLookup};
pub(crate) use coercion::{CoercionOutcome, coerce_arguments, coerce_input_value};
pub(crate) use flatten::{flatten_arguments, flatten_value};

use crate::{
    error::{ExecutionError, SharedError, UnauthorizedError},
    schema::TypeRef,
    value::AppValue,
};

/// How far an argument got through coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentState {
    Initialized,
    Coerced,
    Prepared,
    Finished,
    Errored,
}

/// One resolved argument and how it came to be.
#[derive(Debug, Clone)]
pub struct ArgumentValue {
    pub(crate) name: Name,
    pub(crate) ty: TypeRef,
    pub(crate) value: ConstValue,
    pub(crate) original_value: Option<ConstValue>,
    pub(crate) default_used: bool,
    pub(crate) state: ArgumentState,
}

impl ArgumentValue {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// The final value, after coercion and `prepare`.
    pub fn value(&self) -> &ConstValue {
        &self.value
    }

    /// The value before coercion; `None` when the argument was omitted.
    pub fn original_value(&self) -> Option<&ConstValue> {
        self.original_value.as_ref()
    }

    /// Whether the definition's default value stood in for an omitted argument.
    pub fn default_used(&self) -> bool {
        self.default_used
    }

    pub fn state(&self) -> ArgumentState {
        self.state
    }
}

/// A frozen bag of argument values plus their per-argument details.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: IndexMap<Name, ConstValue>,
    loaded: IndexMap<Name, AppValue>,
    details: IndexMap<Name, ArgumentValue>,
}

impl Arguments {
    pub(crate) fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &IndexMap<Name, ConstValue> {
        &self.values
    }

    /// Objects produced by arguments that `loads` them.
    pub fn loaded(&self, name: &str) -> Option<&AppValue> {
        self.loaded.get(name)
    }

    pub fn details(&self) -> &IndexMap<Name, ArgumentValue> {
        &self.details
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Why an argument bag could not be produced.
#[derive(Debug, Clone)]
pub enum ArgumentError {
    Execution(ExecutionError),
    Unauthorized(UnauthorizedError),
    Unexpected(SharedError),
}

pub(crate) type ArgumentsResult = Result<Arc<Arguments>, ArgumentError>;

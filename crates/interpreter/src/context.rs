// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_graphql_parser::{Positioned, types::Field};
use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::{
    arguments::{ArgumentValue, Arguments},
    dataloader::Dataloader,
    error::{ExecutionError, PathSegment},
    lookahead::Lookahead,
    schema::FieldDefinition,
    value::AppValue,
};

pub(crate) type ContextData = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Per-query state visible to resolvers and hooks.
pub struct QueryContext {
    data: ContextData,
    dataloader: Arc<Dataloader>,
    variables: IndexMap<Name, ConstValue>,
    operation_name: Option<String>,
}

impl QueryContext {
    pub(crate) fn new(
        data: ContextData,
        dataloader: Arc<Dataloader>,
        variables: IndexMap<Name, ConstValue>,
        operation_name: Option<String>,
    ) -> Self {
        Self {
            data,
            dataloader,
            variables,
            operation_name,
        }
    }

    /// Application data attached to the request with [`crate::Request::data`].
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn dataloader(&self) -> &Arc<Dataloader> {
        &self.dataloader
    }

    /// Coerced variable values, including variable defaults.
    pub fn variables(&self) -> &IndexMap<Name, ConstValue> {
        &self.variables
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            HashMap::new(),
            Arc::new(Dataloader::new(Arc::new(crate::trace::NoopTracer))),
            IndexMap::new(),
            None,
        )
    }
}

/// Collects errors a resolver reports without failing its field.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<ExecutionError>>,
}

impl ErrorCollector {
    pub fn add(&self, error: impl Into<ExecutionError>) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.into());
    }

    pub(crate) fn into_errors(self) -> Vec<ExecutionError> {
        self.errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extras are only present when the field definition asked for them.
#[derive(Default)]
pub(crate) struct Extras<'r> {
    pub ast_node: Option<&'r Positioned<Field>>,
    pub path: Option<&'r [PathSegment]>,
    pub lookahead: Option<Lookahead<'r>>,
    pub errors: Option<&'r ErrorCollector>,
    pub parent: Option<&'r AppValue>,
    pub custom: IndexMap<Name, ConstValue>,
}

/// Everything a resolver is called with.
pub struct ResolverContext<'r> {
    pub(crate) object: &'r AppValue,
    pub(crate) arguments: &'r Arguments,
    pub(crate) query: &'r QueryContext,
    pub(crate) type_name: &'r Name,
    pub(crate) field: &'r FieldDefinition,
    pub(crate) extras: Extras<'r>,
}

impl<'r> ResolverContext<'r> {
    /// The application value owning the field.
    pub fn object(&self) -> &'r AppValue {
        self.object
    }

    pub fn downcast_object<T: Any>(&self) -> Option<&'r T> {
        self.object.downcast_ref::<T>()
    }

    pub fn args(&self) -> &'r Arguments {
        self.arguments
    }

    pub fn arg(&self, name: &str) -> Option<&'r ConstValue> {
        self.arguments.get(name)
    }

    /// Deserialize an argument with serde.
    pub fn arg_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, ExecutionError> {
        let value = self.arguments.get(name).cloned().unwrap_or(ConstValue::Null);
        async_graphql_value::from_value(value)
            .map_err(|e| ExecutionError::new(format!("Invalid argument {name}: {e}")))
    }

    /// Per-argument metadata, kept apart from the values themselves.
    pub fn argument_details(&self) -> &'r IndexMap<Name, ArgumentValue> {
        self.arguments.details()
    }

    pub fn loaded(&self, name: &str) -> Option<&'r AppValue> {
        self.arguments.loaded(name)
    }

    pub fn query(&self) -> &'r QueryContext {
        self.query
    }

    pub fn data<T: Any>(&self) -> Option<&'r T> {
        self.query.data::<T>()
    }

    pub fn dataloader(&self) -> &'r Arc<Dataloader> {
        self.query.dataloader()
    }

    pub fn type_name(&self) -> &'r Name {
        self.type_name
    }

    pub fn field_name(&self) -> &'r Name {
        &self.field.name
    }

    pub fn ast_node(&self) -> Option<&'r Positioned<Field>> {
        self.extras.ast_node
    }

    pub fn path(&self) -> Option<&'r [PathSegment]> {
        self.extras.path
    }

    pub fn lookahead(&self) -> Option<&Lookahead<'r>> {
        self.extras.lookahead.as_ref()
    }

    pub fn errors(&self) -> Option<&'r ErrorCollector> {
        self.extras.errors
    }

    /// The application value one level above the owning object.
    pub fn parent(&self) -> Option<&'r AppValue> {
        self.extras.parent
    }

    pub fn extra(&self, name: &str) -> Option<&ConstValue> {
        self.extras.custom.get(name)
    }
}

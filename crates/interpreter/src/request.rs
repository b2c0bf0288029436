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
    sync::Arc,
};

use async_graphql_parser::{
    Positioned, parse_query,
    types::{
        DocumentOperations, ExecutableDocument, FragmentDefinition, OperationDefinition,
        OperationType, VariableDefinition,
    },
};
use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    arguments::coerce_input_value,
    context::{ContextData, QueryContext},
    dataloader::Dataloader,
    schema::{Schema, TypeRef},
    value::AppValue,
};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Parse(#[from] async_graphql_parser::Error),

    #[error("Unknown operation named \"{0}\"")]
    UnknownOperation(String),

    #[error("Operation name required when the document contains more than one operation")]
    OperationNameRequired,

    #[error("Schema is not configured for {0} operations")]
    UnsupportedOperation(String),

    #[error("Variable \"${name}\" of required type \"{ty}\" was not provided")]
    MissingVariable { name: Name, ty: TypeRef },

    #[error("Variable \"${name}\" got invalid value: {message}")]
    InvalidVariable { name: Name, message: String },
}

/// One operation to run, with everything it runs with.
pub struct Request {
    document: ExecutableDocument,
    operation_name: Option<String>,
    variables: serde_json::Map<String, serde_json::Value>,
    root_value: AppValue,
    data: ContextData,
}

impl Request {
    pub fn new(document: ExecutableDocument) -> Self {
        Self {
            document,
            operation_name: None,
            variables: serde_json::Map::new(),
            root_value: AppValue::null(),
            data: HashMap::new(),
        }
    }

    pub fn parse(query: &str) -> Result<Self, RequestError> {
        Ok(Self::new(parse_query(query)?))
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    /// The value the root type's fields are resolved against.
    pub fn root_value(mut self, value: impl Into<AppValue>) -> Self {
        self.root_value = value.into();
        self
    }

    /// Attach application data, available to resolvers by type.
    pub fn data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data.insert(TypeId::of::<T>(), Box::new(data));
        self
    }
}

/// A request whose operation has been picked and whose variables have been coerced.
pub(crate) struct PreparedRequest {
    operation: Positioned<OperationDefinition>,
    fragments: HashMap<Name, Positioned<FragmentDefinition>>,
    root_value: Arc<AppValue>,
    context: Arc<QueryContext>,
}

impl PreparedRequest {
    pub(crate) fn prepare(
        request: Request,
        schema: &Schema,
        dataloader: Arc<Dataloader>,
    ) -> Result<Self, RequestError> {
        let Request {
            document,
            operation_name,
            variables,
            root_value,
            data,
        } = request;
        let ExecutableDocument {
            operations,
            fragments,
        } = document;

        let (operation_name, operation) = select_operation(operations, operation_name)?;
        if schema.root_type(operation.node.ty).is_none() {
            return Err(RequestError::UnsupportedOperation(
                operation.node.ty.to_string(),
            ));
        }
        let variables = coerce_variables(schema, &operation.node.variable_definitions, variables)?;

        Ok(Self {
            operation,
            fragments,
            root_value: Arc::new(root_value),
            context: Arc::new(QueryContext::new(
                data,
                dataloader,
                variables,
                operation_name,
            )),
        })
    }

    pub(crate) fn operation(&self) -> &OperationDefinition {
        &self.operation.node
    }

    pub(crate) fn fragments(&self) -> &HashMap<Name, Positioned<FragmentDefinition>> {
        &self.fragments
    }

    pub(crate) fn root_value(&self) -> &Arc<AppValue> {
        &self.root_value
    }

    pub(crate) fn context(&self) -> &Arc<QueryContext> {
        &self.context
    }

    pub(crate) fn is_mutation(&self) -> bool {
        self.operation.node.ty == OperationType::Mutation
    }
}

fn select_operation(
    operations: DocumentOperations,
    name: Option<String>,
) -> Result<(Option<String>, Positioned<OperationDefinition>), RequestError> {
    match (operations, name) {
        (DocumentOperations::Single(operation), None) => Ok((None, operation)),
        (DocumentOperations::Single(_), Some(name)) => Err(RequestError::UnknownOperation(name)),
        (DocumentOperations::Multiple(mut operations), Some(name)) => {
            match operations.remove(name.as_str()) {
                Some(operation) => Ok((Some(name), operation)),
                None => Err(RequestError::UnknownOperation(name)),
            }
        }
        (DocumentOperations::Multiple(operations), None) => {
            if operations.len() != 1 {
                return Err(RequestError::OperationNameRequired);
            }
            operations
                .into_iter()
                .next()
                .map(|(name, operation)| (Some(name.to_string()), operation))
                .ok_or(RequestError::OperationNameRequired)
        }
    }
}

/// Convert and check provided variables; apply defaults. Variables that are neither
/// provided nor defaulted stay unbound.
fn coerce_variables(
    schema: &Schema,
    definitions: &[Positioned<VariableDefinition>],
    mut provided: serde_json::Map<String, serde_json::Value>,
) -> Result<IndexMap<Name, ConstValue>, RequestError> {
    let mut variables = IndexMap::new();

    for definition in definitions {
        let name = &definition.node.name.node;
        let ty = TypeRef::from(&definition.node.var_type.node);

        let value = match provided.remove(name.as_str()) {
            Some(json) => Some(ConstValue::from_json(json).map_err(|error| {
                RequestError::InvalidVariable {
                    name: name.clone(),
                    message: error.to_string(),
                }
            })?),
            None => definition
                .node
                .default_value
                .as_ref()
                .map(|default| default.node.clone()),
        };
        let missing = value.is_none();

        match coerce_input_value(schema, &ty, value) {
            Ok(Some(value)) => {
                variables.insert(name.clone(), value);
            }
            Ok(None) => {}
            Err(_) if missing => {
                return Err(RequestError::MissingVariable {
                    name: name.clone(),
                    ty,
                });
            }
            Err(message) => {
                return Err(RequestError::InvalidVariable {
                    name: name.clone(),
                    message,
                });
            }
        }
    }

    Ok(variables)
}

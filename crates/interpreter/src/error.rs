// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt, sync::Arc};

use async_graphql_parser::Pos;
use async_graphql_value::Name;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// An unexpected error raised by application code. Shared so that a single failure can be
/// observed by every step waiting on the same batched or cached computation.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(Name),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSegment::Field(name) => serializer.serialize_str(name.as_str()),
            PathSegment::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(Name::new(name))
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for ErrorLocation {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// An expected, schema-domain error. It ends up in the `errors` array of the response and
/// nulls the position it was raised at, but never aborts the query.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, serde_json::Value>>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: vec![],
            path: None,
            extensions: None,
        }
    }

    pub fn with_extension(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extensions
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Fill in the path and location unless the raiser already supplied them.
    pub(crate) fn attach(&mut self, path: impl FnOnce() -> Vec<PathSegment>, pos: Pos) {
        if self.path.is_none() {
            self.path = Some(path());
        }
        if self.locations.is_empty() {
            self.locations.push(pos.into());
        }
    }
}

impl From<&str> for ExecutionError {
    fn from(message: &str) -> Self {
        ExecutionError::new(message)
    }
}

impl From<String> for ExecutionError {
    fn from(message: String) -> Self {
        ExecutionError::new(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnauthorizedError {
    #[error("An instance of {type_name} failed {type_name}'s authorization check")]
    Object { type_name: Name },

    #[error("An instance of {type_name} failed {type_name}.{field_name}'s authorization check")]
    Field { type_name: Name, field_name: Name },
}

/// The error side of a resolver's return value.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    Unexpected(SharedError),
}

impl ResolverError {
    pub fn unexpected(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ResolverError::Unexpected(Arc::new(error))
    }
}

/// Fatal errors. Any of these aborts the whole run; no partial response is produced.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unhandled error at {path}: {error}")]
    Unhandled { path: String, error: SharedError },

    #[error("{abstract_type} resolved to {resolved}, which is not one of its possible types")]
    UnresolvedType {
        abstract_type: Name,
        resolved: String,
    },

    #[error("Expected a list at {path} but the resolver produced {found}")]
    ListExpected { path: String, found: String },

    #[error("Field {field_name} is not defined on {type_name}")]
    UnknownField { type_name: Name, field_name: Name },

    #[error("Type {0} is not defined in the schema")]
    UnknownType(Name),

    #[error("{0}")]
    Invariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_error_omits_empty_parts() {
        let error = ExecutionError::new("boom");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({ "message": "boom" })
        );

        let mut error = ExecutionError::new("boom").with_extension("code", "E1");
        error.attach(
            || vec!["a".into(), 2.into(), "b".into()],
            Pos { line: 3, column: 7 },
        );
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "message": "boom",
                "locations": [{ "line": 3, "column": 7 }],
                "path": ["a", 2, "b"],
                "extensions": { "code": "E1" }
            })
        );
    }

    #[test]
    fn attach_keeps_existing_path() {
        let mut error = ExecutionError::new("boom").with_path(vec!["x".into()]);
        error.attach(|| vec!["y".into()], Pos { line: 1, column: 1 });

        assert_eq!(error.path, Some(vec!["x".into()]));
        assert_eq!(format_path(&[PathSegment::from("a"), 0.into()]), "a.0");
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::Serialize;

use crate::{
    error::{ErrorLocation, ExecutionError},
    request::RequestError,
};

/// The `{ data, errors }` envelope of an executed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// `None` when the request never started executing (see [`Response::from_request_error`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionError>,
}

impl Response {
    pub fn from_request_error(error: RequestError) -> Self {
        let mut execution_error = ExecutionError::new(error.to_string());
        if let RequestError::Parse(parse_error) = &error {
            execution_error.locations = parse_error
                .positions()
                .map(ErrorLocation::from)
                .collect();
        }

        Self {
            data: None,
            errors: vec![execution_error],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

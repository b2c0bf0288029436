// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_graphql_value::ConstValue;
use graphql_interpreter::{
    Executor, ExecutorConfig, Request, ResolvedValue, Response, Schema, schema::SchemaBuilder,
};

pub fn schema(builder: SchemaBuilder) -> Arc<Schema> {
    Arc::new(builder.finish().expect("schema should be valid"))
}

pub fn data(value: serde_json::Value) -> ConstValue {
    ConstValue::from_json(value).expect("JSON should convert to a GraphQL value")
}

pub fn resolved(value: serde_json::Value) -> ResolvedValue {
    ResolvedValue::Value(data(value))
}

pub fn variables(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("variables must be an object, got {other}"),
    }
}

pub async fn execute(schema: &Arc<Schema>, request: Request) -> Response {
    execute_with(schema, ExecutorConfig::default(), request).await
}

pub async fn execute_with(
    schema: &Arc<Schema>,
    config: ExecutorConfig,
    request: Request,
) -> Response {
    Executor::with_config(schema.clone(), config)
        .execute(request)
        .await
        .expect("execution should not fail fatally")
}

/// Run `query` and return the whole response as compact JSON, keys in response order.
pub async fn run(schema: &Arc<Schema>, query: &str) -> String {
    let response = execute(schema, Request::parse(query).expect("query should parse")).await;
    serde_json::to_string(&response).expect("response should serialize")
}

/// An append-only log shared between resolvers and the test.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod fixtures;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_graphql_value::ConstValue;
use async_trait::async_trait;
use graphql_interpreter::{
    ExecutionError, Executor, ExecutorConfig, Lazy, Request, ResolvedValue, ResolverContext,
    Schema,
    dataloader::BatchSource,
    schema::{FieldDefinition, InputValueDefinition, ObjectType},
};
use serde_json::json;
use test_log::test;

use fixtures::{Log, data, resolved, run, schema};

fn lazy_chain(log: Log, label: &'static str, depth: usize, value: i32) -> ResolvedValue {
    ResolvedValue::Lazy(Lazy::new(async move {
        log.push(format!("{label}-{depth}"));
        if depth == 1 {
            Ok(ResolvedValue::from(value))
        } else {
            Ok(lazy_chain(log, label, depth - 1, value))
        }
    }))
}

#[test(tokio::test)]
async fn chained_lazies_are_forced_until_a_value_comes_out() {
    let log = Log::default();
    let schema = schema(
        Schema::build("Query").register(
            ObjectType::new("Query")
                .field(FieldDefinition::new("value", "Int!").resolve({
                    let log = log.clone();
                    move |_| Ok(lazy_chain(log.clone(), "value", 3, 42))
                }))
                .field(FieldDefinition::new("items", "[Int]").resolve({
                    let log = log.clone();
                    move |_| {
                        Ok(ResolvedValue::List(vec![
                            lazy_chain(log.clone(), "first", 1, 1),
                            lazy_chain(log.clone(), "second", 2, 2),
                        ]))
                    }
                })),
        ),
    );

    insta::assert_snapshot!(
        run(&schema, "{ value items }").await,
        @r#"{"data":{"value":42,"items":[1,2]}}"#
    );
    assert_eq!(
        log.entries(),
        vec!["value-3", "value-2", "value-1", "first-1", "second-2", "second-1"]
    );
}

#[test(tokio::test)]
async fn shallower_parked_steps_resume_first() {
    let log = Log::default();
    let schema = schema(
        Schema::build("Query")
            .register(
                ObjectType::new("Query")
                    .field(
                        FieldDefinition::new("nested", "Nested")
                            .resolve(|_| Ok(resolved(json!({})))),
                    )
                    .field(FieldDefinition::new("slow", "Int").resolve({
                        let log = log.clone();
                        move |_| Ok(lazy_chain(log.clone(), "slow", 2, 1))
                    })),
            )
            .register(ObjectType::new("Nested").field(
                FieldDefinition::new("deep", "Int").resolve({
                    let log = log.clone();
                    move |_| Ok(lazy_chain(log.clone(), "deep", 1, 2))
                }),
            )),
    );

    insta::assert_snapshot!(
        run(&schema, "{ nested { deep } slow }").await,
        @r#"{"data":{"nested":{"deep":2},"slow":1}}"#
    );
    // `deep` was parked first, but one level further down
    assert_eq!(log.entries(), vec!["slow-2", "slow-1", "deep-1"]);
}

fn logging_root(name: &str, log: &Log) -> ObjectType {
    let make_field = |field: &'static str, value: i32| {
        let log = log.clone();
        FieldDefinition::new(field, "Int").resolve(move |_| {
            log.push(format!("start {field}"));
            let log = log.clone();
            Ok(ResolvedValue::Lazy(Lazy::new(async move {
                log.push(format!("end {field}"));
                Ok(ResolvedValue::from(value))
            })))
        })
    };
    ObjectType::new(name)
        .field(make_field("a", 1))
        .field(make_field("b", 2))
}

#[test(tokio::test)]
async fn mutation_fields_run_one_after_another() {
    let log = Log::default();
    let schema = schema(
        Schema::build("Query")
            .mutation("Mutation")
            .register(logging_root("Query", &log))
            .register(logging_root("Mutation", &log)),
    );

    assert_eq!(
        run(&schema, "mutation { b a }").await,
        r#"{"data":{"b":2,"a":1}}"#
    );
    assert_eq!(log.entries(), vec!["start b", "end b", "start a", "end a"]);

    let log_len = log.entries().len();
    run(&schema, "{ b a }").await;
    assert_eq!(
        log.entries()[log_len..],
        ["start b", "start a", "end b", "end a"]
    );
}

struct Users {
    batches: Log,
}

#[async_trait]
impl BatchSource for Users {
    type Key = i64;
    type Value = String;

    async fn fetch(&self, keys: &[i64]) -> Result<Vec<String>, ExecutionError> {
        self.batches.push(format!("{keys:?}"));
        Ok(keys.iter().map(|key| format!("user-{key}")).collect())
    }
}

fn author_id(context: &ResolverContext<'_>) -> Option<i64> {
    match context.object().as_data()? {
        ConstValue::Object(fields) => match fields.get("authorId")? {
            ConstValue::Number(id) => id.as_i64(),
            _ => None,
        },
        _ => None,
    }
}

fn posts_schema(batches: &Log) -> Arc<Schema> {
    let batches = batches.clone();
    schema(
        Schema::build("Query")
            .register(ObjectType::new("Query").field(FieldDefinition::new("posts", "[Post!]!")))
            .register(ObjectType::new("Post").field(
                FieldDefinition::new("author", "String").resolve(move |context| {
                    let Some(id) = author_id(context) else {
                        return Ok(ResolvedValue::null());
                    };
                    let batches = batches.clone();
                    let lazy = context
                        .dataloader()
                        .source("", move || Users { batches })
                        .load(id)
                        .map(ResolvedValue::from);
                    Ok(ResolvedValue::Lazy(lazy))
                }),
            )),
    )
}

fn posts_request(author_ids: &[i64]) -> Request {
    let posts: Vec<_> = author_ids
        .iter()
        .map(|id| json!({ "authorId": id }))
        .collect();
    Request::parse("{ posts { author } }")
        .unwrap()
        .root_value(data(json!({ "posts": posts })))
}

#[test(tokio::test)]
async fn batch_loads_at_the_same_depth_are_coalesced() {
    for nonblocking in [true, false] {
        let batches = Log::default();
        let schema = posts_schema(&batches);
        let config = ExecutorConfig {
            nonblocking,
            ..ExecutorConfig::default()
        };

        let response = fixtures::execute_with(&schema, config, posts_request(&[1, 2, 1])).await;

        assert_eq!(
            response.data,
            Some(json!({
                "posts": [{ "author": "user-1" }, { "author": "user-2" }, { "author": "user-1" }]
            }))
        );
        assert_eq!(batches.entries(), vec!["[1, 2]"]);
    }
}

#[test(tokio::test)]
async fn multiplexed_requests_share_batches() {
    let batches = Log::default();
    let schema = posts_schema(&batches);

    let responses = Executor::new(schema)
        .execute_multiplex(vec![
            posts_request(&[1, 2]),
            Request::parse("query Named { posts { author } }")
                .unwrap()
                .operation_name("Other"),
            posts_request(&[2, 3]),
        ])
        .await
        .unwrap();

    assert_eq!(batches.entries(), vec!["[1, 2, 3]"]);
    assert_eq!(
        responses[0].data,
        Some(json!({ "posts": [{ "author": "user-1" }, { "author": "user-2" }] }))
    );
    assert_eq!(responses[1].data, None);
    assert_eq!(responses[1].errors[0].message, "Unknown operation named \"Other\"");
    assert_eq!(
        responses[2].data,
        Some(json!({ "posts": [{ "author": "user-2" }, { "author": "user-3" }] }))
    );
}

#[test(tokio::test)]
async fn arguments_are_coerced_once_per_field_node() {
    let prepared = Arc::new(AtomicUsize::new(0));
    let schema = schema(
        Schema::build("Query")
            .register(ObjectType::new("Query").field(FieldDefinition::new("posts", "[Post!]!")))
            .register(
                ObjectType::new("Post").field(
                    FieldDefinition::new("title", "String")
                        .argument(InputValueDefinition::new("suffix", "String").prepare({
                            let prepared = prepared.clone();
                            move |value, _| {
                                prepared.fetch_add(1, Ordering::SeqCst);
                                Ok(value)
                            }
                        }))
                        .resolve(|context| {
                            let title = match context.object().as_data() {
                                Some(ConstValue::Object(fields)) => match fields.get("title") {
                                    Some(ConstValue::String(title)) => title.clone(),
                                    _ => String::new(),
                                },
                                _ => String::new(),
                            };
                            let suffix: String = context.arg_as("suffix")?;
                            Ok(ResolvedValue::from(format!("{title}{suffix}")))
                        }),
                ),
            ),
    );
    let request = Request::parse(r#"{ posts { title(suffix: "!") again: title(suffix: "?") } }"#)
        .unwrap()
        .root_value(data(json!({
            "posts": [{ "title": "a" }, { "title": "b" }, { "title": "c" }]
        })));

    let response = fixtures::execute(&schema, request).await;

    assert_eq!(
        response.data,
        Some(json!({
            "posts": [
                { "title": "a!", "again": "a?" },
                { "title": "b!", "again": "b?" },
                { "title": "c!", "again": "c?" }
            ]
        }))
    );
    // One coercion per field node, not per post
    assert_eq!(prepared.load(Ordering::SeqCst), 2);
}
